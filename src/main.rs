use clap::{Args, Parser, Subcommand};
use placement_intake::config::AppConfig;
use placement_intake::error::AppError;
use placement_intake::telemetry;
use placement_intake::workflows::intake::{
    FieldId, FieldValue, IntakeService, IntakeWizard, Submission,
};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "Placement Intake",
    about = "Inspect the placement questionnaire and record submissions from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the sections, their fields and the placement sites
    Outline,
    /// Walk a JSON answer file through every section and store the result
    Submit(SubmitArgs),
}

#[derive(Args, Debug)]
struct SubmitArgs {
    /// JSON object mapping field keys to values, e.g. {"first_name": {"text": "Noa"}}
    #[arg(long)]
    answers: PathBuf,
    /// Print the assembled record instead of storing it
    #[arg(long)]
    dry_run: bool,
}

fn main() {
    if let Err(err) = run_cli() {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    let wizard = config.intake.wizard()?;

    match cli.command {
        Command::Outline => {
            print!("{}", render_outline(&wizard));
            Ok(())
        }
        Command::Submit(args) => {
            let answers = read_answers(&args.answers)?;
            let mut submission = walk_answers(&wizard, &answers)?;

            if args.dry_run {
                let record = wizard.assemble_record(&submission)?;
                println!("{}", to_pretty_json(&record)?);
                return Ok(());
            }

            let service = IntakeService::new(Arc::new(wizard), Arc::new(config.intake.store()));
            let record = service.finalize(&mut submission)?;
            info!(csv = %config.intake.csv_path.display(), "submission stored");
            println!(
                "Stored submission for {} {} in {}",
                record.get("first_name").unwrap_or_default(),
                record.get("last_name").unwrap_or_default(),
                config.intake.csv_path.display()
            );
            Ok(())
        }
    }
}

fn read_answers(path: &Path) -> Result<BTreeMap<FieldId, FieldValue>, AppError> {
    let reader = BufReader::new(File::open(path)?);
    serde_json::from_reader(reader)
        .map_err(|err| AppError::Input(format!("{}: {err}", path.display())))
}

fn to_pretty_json<T: serde::Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string_pretty(value).map_err(|err| AppError::Input(err.to_string()))
}

/// Fill each section from `answers` in schema order, confirm it and advance. Stops at the first
/// rejected value or blocked section.
fn walk_answers(
    wizard: &IntakeWizard,
    answers: &BTreeMap<FieldId, FieldValue>,
) -> Result<Submission, AppError> {
    if let Some(stray) = answers
        .keys()
        .find(|field| wizard.questionnaire().field(**field).is_none())
    {
        return Err(AppError::Input(format!("'{stray}' is not a questionnaire field")));
    }

    let mut submission = wizard.new_submission();
    while let Some(schema) = wizard.current_schema(&submission) {
        let number = wizard.current_section(&submission).unwrap_or_default();
        let fields: Vec<FieldId> = schema.fields.iter().map(|field| field.id).collect();

        for field in fields {
            let Some(value) = answers.get(&field) else {
                continue;
            };
            let report = wizard.set_field(&mut submission, field, value.clone())?;
            if !report.is_empty() {
                return Err(AppError::Input(report.messages().join(" ")));
            }
        }

        wizard.acknowledge(&mut submission, true)?;
        let report = wizard.advance(&mut submission)?;
        if !report.is_empty() {
            return Err(AppError::Input(format!(
                "section {number} was not accepted: {}",
                report.messages().join(" ")
            )));
        }
    }

    Ok(submission)
}

fn render_outline(wizard: &IntakeWizard) -> String {
    let questionnaire = wizard.questionnaire();
    let mut out = String::new();

    for (index, section) in questionnaire.sections().iter().enumerate() {
        out.push_str(&format!("{}. {}\n", index + 1, section.title()));
        for field in &section.fields {
            let marker = if field.is_required() { "*" } else { " " };
            out.push_str(&format!("   {marker} {:<24} {}\n", field.id.key(), field.label));
        }
    }

    out.push_str(&format!(
        "\nPlacement sites ({} ranks)\n",
        questionnaire.rank_count()
    ));
    for site in wizard.catalog().sites() {
        out.push_str(&format!("   - {site}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use placement_intake::workflows::intake::{Choice, CsvSubmissionStore};
    use serde_json::json;

    fn answers() -> BTreeMap<FieldId, FieldValue> {
        serde_json::from_value(json!({
            "first_name": { "text": "Tamar" },
            "last_name": { "text": "Ben David" },
            "national_id": { "text": "31415926" },
            "gender": { "choice": { "selected": { "listed": "Female" } } },
            "social_affiliation": { "choice": { "selected": { "listed": "Christian" } } },
            "mother_tongue": { "choice": { "selected": { "listed": "Russian" } } },
            "phone": { "text": "050-7654321" },
            "address": { "text": "Rosh Pina" },
            "email": { "text": "tamar@example.org" },
            "study_year": { "choice": { "selected": "other" } },
            "study_year_other": { "text": "Exchange student" },
            "study_track": { "text": "Social work" },
            "mobility": { "choice": { "selected": { "listed": "I can travel by public transport" } } },
            "previous_training": { "choice": { "selected": { "listed": "No" } } },
            "preferred_domains": { "choices": [ { "listed": "Mental health" } ] },
            "top_domain": { "choice": { "selected": { "listed": "Mental health" } } },
            "rank_1": { "choice": { "selected": { "listed": "Kiryat Shmona Welfare Services" } } },
            "rank_2": { "choice": { "selected": { "listed": "Ziv Medical Center" } } },
            "rank_3": { "choice": { "selected": { "listed": "Senior Day Center" } } },
            "grade_average": { "number": 84.25 },
            "adjustments": { "choices": [ { "listed": "None" } ] },
            "adjustments_details": { "text": "None" },
            "motivation_effort": { "choice": { "selected": { "listed": "3" } } },
            "motivation_growth": { "choice": { "selected": { "listed": "4" } } },
            "motivation_commitment": { "choice": { "selected": { "listed": "Strongly agree" } } }
        }))
        .expect("answers deserialize")
    }

    #[test]
    fn answer_file_walks_to_submission() {
        let wizard = IntakeWizard::standard();
        let submission = walk_answers(&wizard, &answers()).expect("every section passes");

        assert!(submission.is_submitted());
        let record = wizard.assemble_record(&submission).expect("record");
        assert_eq!(record.get("study_year"), Some("Exchange student"));
        assert_eq!(record.get("grade_average"), Some("84.25"));
    }

    #[test]
    fn blocked_section_is_reported_as_input_error() {
        let wizard = IntakeWizard::standard();
        let mut answers = answers();
        answers.remove(&FieldId::Email);

        let err = walk_answers(&wizard, &answers).expect_err("section 1 blocks");
        assert!(matches!(err, AppError::Input(ref message)
            if message.starts_with("section 1") && message.contains("Email address is required.")));
    }

    #[test]
    fn rank_conflict_in_answers_is_reported() {
        let wizard = IntakeWizard::standard();
        let mut answers = answers();
        answers.insert(FieldId::SiteRank(2), FieldValue::listed("Kiryat Shmona Welfare Services"));

        let err = walk_answers(&wizard, &answers).expect_err("conflict");
        assert!(err.to_string().contains("already your choice for rank 1"));
    }

    #[test]
    fn stray_rank_key_is_rejected() {
        let wizard = IntakeWizard::standard();
        let mut answers = answers();
        answers.insert(FieldId::SiteRank(7), FieldValue::Choices(vec![Choice::Other]));

        assert!(matches!(
            walk_answers(&wizard, &answers),
            Err(AppError::Input(message)) if message.contains("rank_7")
        ));
    }

    #[test]
    fn walked_submission_can_be_stored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let wizard = Arc::new(IntakeWizard::standard());
        let mut submission = walk_answers(&wizard, &answers()).expect("submission");
        let store = Arc::new(CsvSubmissionStore::new(dir.path().join("rows.csv")));
        let service = IntakeService::new(wizard, Arc::clone(&store));

        service.finalize(&mut submission).expect("stored");
        let rows = store.rows().expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("rank_1").map(String::as_str), Some("Kiryat Shmona Welfare Services"));
    }

    #[test]
    fn outline_lists_every_section_and_site() {
        let outline = render_outline(&IntakeWizard::standard());
        assert!(outline.contains("1. Personal Details"));
        assert!(outline.contains("6. Summary & Submission"));
        assert!(outline.contains("Safed Youth Club"));
        assert!(outline.contains("* first_name"));
    }
}
