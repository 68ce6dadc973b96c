//! Archive reconciliation between reports and persisted settings.
//!
//! Settings are the source of truth across sessions; a report's
//! `archived` flag is a cached copy that these functions keep equal to
//! settings membership. Persisting is left to the caller.

use road_reports_report_models::Report;
use road_reports_settings::Settings;

/// Sets every report's `archived` flag from settings membership.
pub fn reconcile<'a>(reports: impl IntoIterator<Item = &'a mut Report>, settings: &Settings) {
    for report in reports {
        report.archived = settings.is_archived(&report.id);
    }
}

/// Archives or un-archives one report.
///
/// The report flag changes first, then the settings entry. Returns `true`
/// if the report's state changed.
pub fn set_archived(report: &mut Report, settings: &mut Settings, archived: bool) -> bool {
    let changed = report.archived != archived;
    report.archived = archived;
    if archived {
        // The feeds expose no update number, so the id doubles as the marker.
        settings.archive(&report.id, &report.id);
    } else {
        settings.unarchive(&report.id);
    }
    changed
}

/// Applies [`set_archived`] to every report. Returns how many changed.
pub fn set_all_archived<'a>(
    reports: impl IntoIterator<Item = &'a mut Report>,
    settings: &mut Settings,
    archived: bool,
) -> usize {
    reports
        .into_iter()
        .filter_map(|report| set_archived(report, settings, archived).then_some(()))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::report;

    #[test]
    fn reconcile_matches_settings_membership() {
        let mut settings = Settings::default();
        settings.archive("5", "5");
        let mut reports: Vec<Report> = (1..=8)
            .map(|i| report(&i.to_string(), "loc", i % 2 == 0))
            .collect();

        reconcile(&mut reports, &settings);

        for report in &reports {
            assert_eq!(report.archived, settings.is_archived(&report.id));
        }
        assert!(reports[4].archived);
        assert_eq!(reports.iter().filter(|r| r.archived).count(), 1);
    }

    #[test]
    fn archive_and_unarchive_one() {
        let mut settings = Settings::default();
        let mut r = report("7", "loc", false);

        assert!(set_archived(&mut r, &mut settings, true));
        assert!(r.archived);
        assert_eq!(settings.archive["7"].archived_at_version, "7");

        assert!(!set_archived(&mut r, &mut settings, true));

        assert!(set_archived(&mut r, &mut settings, false));
        assert!(!r.archived);
        assert!(!settings.is_archived("7"));
    }

    #[test]
    fn bulk_archive_counts_changes() {
        let mut settings = Settings::default();
        let mut reports = vec![
            report("1", "a", false),
            report("2", "b", false),
            report("3", "c", false),
        ];
        set_archived(&mut reports[1], &mut settings, true);

        assert_eq!(set_all_archived(&mut reports, &mut settings, true), 2);
        assert_eq!(settings.archive.len(), 3);

        assert_eq!(set_all_archived(&mut reports, &mut settings, false), 3);
        assert!(settings.archive.is_empty());
        assert!(reports.iter().all(|r| !r.archived));
    }

    #[test]
    fn unarchive_keeps_entries_of_reports_not_in_this_cycle() {
        let mut settings = Settings::default();
        settings.archive("old", "old");
        let mut reports = vec![report("1", "a", true)];
        settings.archive("1", "1");

        set_all_archived(&mut reports, &mut settings, false);

        assert!(settings.is_archived("old"));
        assert!(!settings.is_archived("1"));
    }
}
