//! Per-URI outcome tracking and the summary printout

use netfetch::StatsSnapshot;
use url::Url;

/// What happened to one requested URI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Served synchronously from memory, disk or a local file
    Cached(usize),
    /// Handed to the download queue, no notification yet
    Pending,
    /// Notified as downloaded
    Downloaded(usize),
    /// Notified, but the value could not be read back
    Unreadable,
}

/// Outcomes in request order
#[derive(Debug, Default)]
pub struct Report {
    entries: Vec<(Url, Outcome)>,
}

impl Report {
    /// Set the outcome for `uri`, keeping its original position
    pub fn record(&mut self, uri: Url, outcome: Outcome) {
        match self.entries.iter_mut().find(|(u, _)| *u == uri) {
            Some(entry) => entry.1 = outcome,
            None => self.entries.push((uri, outcome)),
        }
    }

    /// URIs still waiting for a notification
    pub fn pending(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Pending))
    }

    /// URIs that did not end up readable
    pub fn incomplete(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Pending | Outcome::Unreadable))
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.entries.iter().filter(|(_, o)| pred(o)).count()
    }

    /// Print one line per URI plus memory cache counters
    pub fn print(&self, stats: &StatsSnapshot) {
        for (uri, outcome) in &self.entries {
            match outcome {
                Outcome::Cached(size) => println!("  cached      {:>10} B  {}", size, uri),
                Outcome::Downloaded(size) => println!("  downloaded  {:>10} B  {}", size, uri),
                Outcome::Pending => println!("  incomplete               {}", uri),
                Outcome::Unreadable => println!("  unreadable               {}", uri),
            }
        }
        println!(
            "\n{} requested, {} incomplete | memory: {} hits, {} misses, {} evictions ({:.1}% hit rate)",
            self.entries.len(),
            self.incomplete(),
            stats.hits,
            stats.misses,
            stats.evictions,
            stats.hit_ratio() * 100.0
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_record_updates_in_place() {
        let mut report = Report::default();
        report.record(uri("https://a.example/1"), Outcome::Pending);
        report.record(uri("https://a.example/2"), Outcome::Cached(4));
        report.record(uri("https://a.example/1"), Outcome::Downloaded(9));

        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.entries[0].1, Outcome::Downloaded(9));
        assert_eq!(report.pending(), 0);
        assert_eq!(report.incomplete(), 0);
    }

    #[test]
    fn test_incomplete_counts_pending_and_unreadable() {
        let mut report = Report::default();
        report.record(uri("https://a.example/1"), Outcome::Pending);
        report.record(uri("https://a.example/2"), Outcome::Unreadable);

        assert_eq!(report.pending(), 1);
        assert_eq!(report.incomplete(), 2);
    }
}
