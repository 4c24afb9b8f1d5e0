//! Parsing of the Summarize stage's Markdown reply into structured
//! details. The text itself is stored verbatim (after line-ending
//! normalization); the section breakdown is a parallel projection of it.

use gijiroku_db::models::SummaryDetails;

pub struct ParsedSummary {
    pub formatted_text: String,
    pub details: SummaryDetails,
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Summary,
    Agenda,
    Decisions,
    Todo,
    NextActions,
    NextMeeting,
    Unknown,
}

/// Split the reply on the canonical top-level headings. A heading the
/// model omitted simply leaves its section empty.
pub fn parse_summary_markdown(raw: &str) -> ParsedSummary {
    let normalized = normalize(raw);

    let mut details = SummaryDetails::default();
    let mut summary_lines: Vec<String> = Vec::new();
    let mut next_meeting_lines: Vec<String> = Vec::new();
    let mut current: Option<Section> = None;

    for line in normalized.lines() {
        let trimmed = line.trim();

        let heading = match trimmed {
            "# 要約" => Some(Section::Summary),
            "## 議題・議論内容" => Some(Section::Agenda),
            "## 決定事項" => Some(Section::Decisions),
            "## ToDo" => Some(Section::Todo),
            "## 次のアクション" => Some(Section::NextActions),
            "## 次回会議" => Some(Section::NextMeeting),
            t if t.starts_with("# ") || t.starts_with("## ") => Some(Section::Unknown),
            _ => None,
        };
        if let Some(section) = heading {
            current = Some(section);
            continue;
        }

        if trimmed.is_empty() {
            continue;
        }

        match current {
            Some(Section::Summary) => summary_lines.push(trimmed.to_string()),
            Some(Section::Agenda) => details.agenda.push(strip_bullet(trimmed)),
            Some(Section::Decisions) => details.decisions.push(strip_bullet(trimmed)),
            Some(Section::Todo) => details.todo.push(strip_bullet(trimmed)),
            Some(Section::NextActions) => details.next_actions.push(strip_bullet(trimmed)),
            Some(Section::NextMeeting) => next_meeting_lines.push(trimmed.to_string()),
            Some(Section::Unknown) | None => {}
        }
    }

    details.summary = summary_lines.join("\n");
    details.next_meeting = next_meeting_lines.join("\n");

    ParsedSummary {
        formatted_text: normalized,
        details,
    }
}

/// LF line endings, no trailing whitespace, no surrounding blank lines.
/// Code-fence lines are dropped so a fenced reply still parses.
fn normalize(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines: Vec<String> = unified
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .map(|line| line.trim_end().to_string())
        .collect();

    while lines.first().map(|l| l.is_empty()).unwrap_or(false) {
        lines.remove(0);
    }
    while lines.last().map(|l| l.is_empty()).unwrap_or(false) {
        lines.pop();
    }
    lines.join("\n")
}

fn strip_bullet(line: &str) -> String {
    let line = line.strip_prefix("- ").unwrap_or(line);
    let line = line
        .strip_prefix("[ ] ")
        .or_else(|| line.strip_prefix("[x] "))
        .or_else(|| line.strip_prefix("[X] "))
        .unwrap_or(line);
    line.trim().to_string()
}
