//! Interactive menu for browsing and archiving reports.
//!
//! Provides a menu-driven interface using `dialoguer`, looping until the
//! user quits.

use dialoguer::Select;
use road_reports_cli_utils::MultiProgress;
use road_reports_session::Session;
use road_reports_source::config::FeedConfig;
use road_reports_source::coordinator::FetchCoordinator;

use crate::host::ConsoleHost;

/// Actions available in the interactive menu.
enum Action {
    ListReports,
    ShowReport,
    ToggleArchive,
    ArchiveAll,
    UnarchiveAll,
    ToggleHideArchived,
    ToggleLayer,
    SortBy,
    Refresh,
    Quit,
}

impl Action {
    const ALL: &[Self] = &[
        Self::ListReports,
        Self::ShowReport,
        Self::ToggleArchive,
        Self::ArchiveAll,
        Self::UnarchiveAll,
        Self::ToggleHideArchived,
        Self::ToggleLayer,
        Self::SortBy,
        Self::Refresh,
        Self::Quit,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::ListReports => "List reports",
            Self::ShowReport => "Show / hide report details",
            Self::ToggleArchive => "Archive / un-archive a report",
            Self::ArchiveAll => "Archive all",
            Self::UnarchiveAll => "Un-archive all",
            Self::ToggleHideArchived => "Toggle hiding archived reports",
            Self::ToggleLayer => "Toggle report layer",
            Self::SortBy => "Sort by column",
            Self::Refresh => "Refresh reports",
            Self::Quit => "Quit",
        }
    }
}

/// Table columns and the sort key each one maps to.
const COLUMNS: &[(&str, &str)] = &[
    ("Description", "properties.location_description"),
    ("Report type", "category"),
    ("Archived", "archived"),
    ("Id", "id"),
];

/// Fetches reports, then runs the menu loop until the user quits.
///
/// # Errors
///
/// Returns an error if a prompt fails or a sort key cannot be parsed.
#[allow(clippy::future_not_send)]
pub async fn run(
    session: &mut Session<ConsoleHost>,
    coordinator: &FetchCoordinator,
    config: &FeedConfig,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    crate::load(session, coordinator, multi).await;
    crate::print_table(session, false);

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();

    loop {
        let idx = Select::new()
            .with_prompt(format!("{} ({})", config.name, session.summary()))
            .items(&labels)
            .default(0)
            .interact()?;

        match Action::ALL[idx] {
            Action::ListReports => crate::print_table(session, false),
            Action::ShowReport => {
                if let Some(id) = pick_report(session, "Which report?")? {
                    session.toggle_selection(&id)?;
                }
            }
            Action::ToggleArchive => {
                if let Some(id) = pick_report(session, "Archive or un-archive which report?")? {
                    let archived = session.toggle_archived(&id)?;
                    println!(
                        "{} {id} ({})",
                        if archived { "Archived" } else { "Un-archived" },
                        session.summary()
                    );
                }
            }
            Action::ArchiveAll => {
                if crate::confirm_bulk(session, config, "archive")? {
                    let changed = session.archive_all();
                    println!("Archived {changed} reports ({})", session.summary());
                }
            }
            Action::UnarchiveAll => {
                if crate::confirm_bulk(session, config, "un-archive")? {
                    let changed = session.unarchive_all();
                    println!("Un-archived {changed} reports ({})", session.summary());
                }
            }
            Action::ToggleHideArchived => {
                let hide = !session.settings().hide_archived;
                session.set_hide_archived(hide);
                println!(
                    "Archived reports are now {}",
                    if hide { "hidden" } else { "shown" }
                );
            }
            Action::ToggleLayer => {
                let visible = !session.settings().layer_visible;
                session.set_layer_visible(visible);
                println!("Report layer {}", if visible { "shown" } else { "hidden" });
            }
            Action::SortBy => {
                let names: Vec<&str> = COLUMNS.iter().map(|(name, _)| *name).collect();
                let column = Select::new()
                    .with_prompt("Sort by (choosing the current column reverses it)")
                    .items(&names)
                    .default(0)
                    .interact()?;
                session.sort_by_column(COLUMNS[column].1)?;
                println!("Sorted by {}", session.sort_order());
                crate::print_table(session, false);
            }
            Action::Refresh => {
                let progress = road_reports_cli_utils::IndicatifProgress::fetch_bar(
                    multi,
                    "Refreshing reports",
                );
                session.refresh(coordinator, progress).await;
                crate::print_table(session, false);
            }
            Action::Quit => break,
        }
    }

    Ok(())
}

/// Lets the user pick one of the visible reports. Returns `None` if there
/// are none.
fn pick_report(
    session: &Session<ConsoleHost>,
    prompt: &str,
) -> Result<Option<String>, dialoguer::Error> {
    let reports: Vec<(String, String)> = session
        .visible_reports()
        .map(|report| {
            let marker = if report.archived { "[x]" } else { "[ ]" };
            (
                report.id.clone(),
                format!(
                    "{marker} {} - {} ({})",
                    report.category.title(),
                    report.location_description,
                    report.id
                ),
            )
        })
        .collect();

    if reports.is_empty() {
        println!("No reports to choose from.");
        return Ok(None);
    }

    let labels: Vec<&str> = reports.iter().map(|(_, label)| label.as_str()).collect();
    let idx = Select::new()
        .with_prompt(prompt)
        .items(&labels)
        .default(0)
        .max_length(20)
        .interact()?;

    Ok(reports.into_iter().nth(idx).map(|(id, _)| id))
}
