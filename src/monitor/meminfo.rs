use std::path::Path;

/// Where the kernel publishes the page-cache counters.
pub const MEMINFO_PATH: &str = "/proc/meminfo";

/// Placeholder for a counter that cannot be read.
pub const UNKNOWN: &str = "unknown";

/// One reading of the two counters that shrink while flushing proceeds.
/// Values are kept exactly as the kernel prints them, unit included.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MeminfoSample {
    dirty: Option<String>,
    writeback: Option<String>,
}

impl MeminfoSample {
    /// Take a fresh reading. An unreadable source yields an empty sample
    /// rather than an error; progress keeps rendering either way.
    pub async fn read(path: &Path) -> Self {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Self::parse(&text),
            Err(_) => Self::default(),
        }
    }

    fn parse(text: &str) -> Self {
        let mut sample = Self::default();
        for line in text.lines() {
            if let Some(value) = field_value(line, "Dirty:") {
                sample.dirty = Some(value.to_string());
            } else if let Some(value) = field_value(line, "Writeback:") {
                sample.writeback = Some(value.to_string());
            }
        }
        sample
    }

    pub fn dirty_display(&self) -> &str {
        self.dirty.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn writeback_display(&self) -> &str {
        self.writeback.as_deref().unwrap_or(UNKNOWN)
    }
}

/// The rest of `line` after `label`, with the padding spaces dropped.
/// `None` when the line does not start with the label; the trailing colon
/// in the label keeps `Writeback:` from matching `WritebackTmp:`.
fn field_value<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    line.strip_prefix(label)
        .map(|rest| rest.trim_start_matches(' '))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TYPICAL: &str = "\
MemTotal:       16107060 kB
MemFree:         8244932 kB
Dirty:              2412 kB
Writeback:             0 kB
WritebackTmp:       9999 kB
AnonPages:       3523056 kB
";

    #[test]
    fn extracts_counters_verbatim() {
        let sample = MeminfoSample::parse(TYPICAL);
        assert_eq!(sample.dirty_display(), "2412 kB");
        assert_eq!(sample.writeback_display(), "0 kB");
    }

    #[test]
    fn writeback_tmp_is_not_writeback() {
        let sample = MeminfoSample::parse("WritebackTmp:       9999 kB\n");
        assert_eq!(sample.writeback_display(), UNKNOWN);
    }

    #[test]
    fn last_occurrence_wins() {
        let sample = MeminfoSample::parse("Dirty: 100 kB\nDirty: 200 kB\n");
        assert_eq!(sample.dirty_display(), "200 kB");
    }

    #[test]
    fn missing_counters_render_as_unknown() {
        let sample = MeminfoSample::parse("MemTotal: 16107060 kB\n");
        assert_eq!(sample.dirty_display(), UNKNOWN);
        assert_eq!(sample.writeback_display(), UNKNOWN);
    }

    #[test]
    fn value_keeps_everything_after_the_padding() {
        let sample = MeminfoSample::parse("Dirty:                 0 kB\n");
        assert_eq!(sample.dirty_display(), "0 kB");
    }

    #[tokio::test]
    async fn reads_from_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{TYPICAL}").unwrap();

        let sample = MeminfoSample::read(file.path()).await;
        assert_eq!(sample.dirty_display(), "2412 kB");
        assert_eq!(sample.writeback_display(), "0 kB");
    }

    #[tokio::test]
    async fn unreadable_source_yields_unknown_counters() {
        let dir = tempfile::tempdir().unwrap();
        let sample = MeminfoSample::read(&dir.path().join("meminfo")).await;
        assert_eq!(sample.dirty_display(), UNKNOWN);
        assert_eq!(sample.writeback_display(), UNKNOWN);
    }
}
