pub mod fixtures;

#[cfg(test)]
mod cancel_tests;
#[cfg(test)]
mod files_tests;
#[cfg(test)]
mod intake_tests;
#[cfg(test)]
mod recovery_tests;
#[cfg(test)]
mod transcription_tests;
