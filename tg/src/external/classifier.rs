//! Output line classifier
//!
//! The external tool prints free text. This is a best-effort adapter over a
//! fixed rule set: a line either matches one rule and becomes a
//! [`ProgressEvent`], or it is dropped. Unmatched lines are never guessed at.
//!
//! Rules, first match wins:
//!
//! | pattern                                   | stage      | progress |
//! |-------------------------------------------|------------|----------|
//! | `Progress: X/Y`                           | working    | X/Y      |
//! | `Successfully ...`, `Done`, `Complete`    | completed  | 1.0      |
//! | `Generated/Created/Parsed N (sub)tasks`   | generating | 0.8      |
//! | `Analyzing ...`                           | analyzing  | 0.1      |
//! | `Researching ...`                         | analyzing  | 0.2      |
//! | `Generating ...`, `Expanding ...`         | generating | 0.4      |
//! | `Applying/Saving/Writing/Updating ...`    | applying   | 0.9      |
//!
//! Before matching, ANSI escapes are stripped and the line is trimmed. Empty
//! lines, lines over [`MAX_LINE_CHARS`], filesystem paths and known toolchain
//! chatter are dropped.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Longest line that is still considered for classification
pub const MAX_LINE_CHARS: usize = 200;

static ANSI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07]*\x07").expect("valid ansi regex"));

static HIDDEN_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|[\s"'(=:~])(?:/[^\s/"']+)*/\.[A-Za-z0-9_-]+|(?:^|[\s"'(=:])\.[A-Za-z0-9_-]+/"#)
        .expect("valid hidden path regex")
});

static BARE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:~|\.{1,2})?/?(?:[\w.@-]+/)+[\w.@-]*$").expect("valid bare path regex")
});

static CHATTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:npm (?:WARN|notice|ERR!)|\(node:\d*\)|at\s+\S|\(Use `node --trace|.*(?:Deprecation|Experimental)Warning)")
        .expect("valid chatter regex")
});

static BOX_DRAWING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\u{2500}-\u{259F}]").expect("valid box drawing regex"));

static PROGRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bprogress\s*:?\s*(\d+)\s*/\s*(\d+)").expect("valid progress regex")
});

static COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:generated|created|parsed|added)\s+(\d+)\s+(?:new\s+)?(?:sub)?tasks?\b")
        .expect("valid count regex")
});

static COMPLETED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\W*(?:successfully|done\b|completed?\b)").expect("valid completed regex")
});

static ANALYZING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\W*(analy[sz]ing|researching)\b").expect("valid analyzing regex"));

static GENERATING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\W*(?:generating|expanding)\b").expect("valid generating regex"));

static APPLYING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\W*(?:applying|saving|writing|updating)\b").expect("valid applying regex")
});

/// Coarse phase of an external operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Analyzing,
    Generating,
    Working,
    Applying,
    Completed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Analyzing => "analyzing",
            Stage::Generating => "generating",
            Stage::Working => "working",
            Stage::Applying => "applying",
            Stage::Completed => "completed",
        };
        write!(f, "{}", s)
    }
}

/// Structured progress derived from one output line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    /// Estimated completion in `0.0..=1.0`
    pub progress: f64,
    pub current: Option<u64>,
    pub total: Option<u64>,
    /// Number of tasks reported as produced
    pub count: Option<u64>,
    /// The cleaned line
    pub message: String,
}

impl ProgressEvent {
    fn new(stage: Stage, progress: f64, message: &str) -> Self {
        Self {
            stage,
            progress,
            current: None,
            total: None,
            count: None,
            message: message.to_string(),
        }
    }

    fn same_signal(&self, other: &ProgressEvent) -> bool {
        self.stage == other.stage
            && self.progress == other.progress
            && self.current == other.current
            && self.total == other.total
            && self.count == other.count
    }
}

/// Remove ANSI escape sequences
pub fn strip_ansi(line: &str) -> String {
    ANSI.replace_all(line, "").into_owned()
}

/// True for lines that are never forwarded
pub fn is_noise(line: &str) -> bool {
    line.is_empty()
        || line.chars().count() > MAX_LINE_CHARS
        || CHATTER.is_match(line)
        || BOX_DRAWING.is_match(line)
        || HIDDEN_PATH.is_match(line)
        || BARE_PATH.is_match(line)
}

/// Classify one raw output line
pub fn classify_line(raw: &str) -> Option<ProgressEvent> {
    let stripped = strip_ansi(raw);
    let line = stripped.trim();
    if is_noise(line) {
        return None;
    }

    if let Some(caps) = PROGRESS.captures(line) {
        let current: u64 = caps[1].parse().ok()?;
        let total: u64 = caps[2].parse().ok()?;
        if total == 0 {
            return None;
        }
        let mut event = ProgressEvent::new(Stage::Working, (current as f64 / total as f64).min(1.0), line);
        event.current = Some(current);
        event.total = Some(total);
        return Some(event);
    }

    let count = COUNT.captures(line).and_then(|caps| caps[1].parse::<u64>().ok());

    if COMPLETED.is_match(line) {
        let mut event = ProgressEvent::new(Stage::Completed, 1.0, line);
        event.count = count;
        return Some(event);
    }

    if count.is_some() {
        let mut event = ProgressEvent::new(Stage::Generating, 0.8, line);
        event.count = count;
        return Some(event);
    }

    if let Some(caps) = ANALYZING.captures(line) {
        let progress = if caps[1].eq_ignore_ascii_case("researching") {
            0.2
        } else {
            0.1
        };
        return Some(ProgressEvent::new(Stage::Analyzing, progress, line));
    }

    if GENERATING.is_match(line) {
        return Some(ProgressEvent::new(Stage::Generating, 0.4, line));
    }

    if APPLYING.is_match(line) {
        return Some(ProgressEvent::new(Stage::Applying, 0.9, line));
    }

    None
}

/// Stateful wrapper over [`classify_line`] for one command run
///
/// Consecutive events carrying the same signal are suppressed, and stage
/// estimates never fall below the highest progress already reported.
/// `Progress: X/Y` ratios are passed through unchanged.
#[derive(Debug, Default)]
pub struct ProgressClassifier {
    last: Option<ProgressEvent>,
    high_water: f64,
}

impl ProgressClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line; returns the event to forward, if any
    pub fn feed(&mut self, raw: &str) -> Option<ProgressEvent> {
        let mut event = classify_line(raw)?;
        if event.stage != Stage::Working {
            event.progress = event.progress.max(self.high_water);
        }
        if self.last.as_ref().is_some_and(|last| last.same_signal(&event)) {
            return None;
        }
        self.high_water = self.high_water.max(event.progress);
        self.last = Some(event.clone());
        Some(event)
    }

    /// Highest progress reported so far
    pub fn high_water(&self) -> f64 {
        self.high_water
    }
}
