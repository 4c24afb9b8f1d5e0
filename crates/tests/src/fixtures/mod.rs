pub mod backends;

/// A short valid WAV recording (16 kHz mono, 16-bit sine), built in
/// memory so every test uploads a genuinely decodable file.
pub fn wav_fixture(seconds: f64) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        let total = (seconds * 16_000.0) as usize;
        for i in 0..total {
            let t = i as f32 / 16_000.0;
            let sample = ((t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 8000.0) as i16;
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}
