//! Rehab CLI - break down rehabilitation goals and cascade their completion.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rehab_breakdown::{decompose, suggest, validate};
use rehab_cascade::{
    AutoConfirm, CascadeEngine, CascadeTermination, Confirmation, PromotionConfirmer,
    PromotionProposal,
};
use rehab_core::{BreakdownConfig, Goal, GoalId, GoalPatch, GoalStatus, PatientId, Tier};
use rehab_storage::{GoalStore, JsonStore, StatusFilter};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "rehab")]
#[command(about = "Rehabilitation goal breakdown and completion tracking", long_about = None)]
struct Cli {
    /// Data directory
    #[arg(long, default_value = ".rehab")]
    data_dir: std::path::PathBuf,

    /// Log debug output
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a long-term goal
    Add {
        /// Patient ID (a new one is generated if omitted)
        #[arg(long)]
        patient: Option<String>,
        /// Goal title
        #[arg(long)]
        title: String,
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// Last day (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,
        /// Target completion rate (0-100)
        #[arg(long, default_value = "100")]
        rate: u8,
    },
    /// List goals
    List {
        /// Only this patient's goals
        #[arg(long)]
        patient: Option<String>,
        /// Only goals of this tier
        #[arg(long)]
        tier: Option<String>,
    },
    /// Show goal details
    Show {
        /// Goal ID
        id: String,
    },
    /// Break a goal into the next tier down
    Breakdown {
        /// Goal ID
        id: String,
        /// Number of children (defaults to 6 months or 4 weeks)
        #[arg(long)]
        children: Option<u32>,
        /// Do not spread progress evenly
        #[arg(long)]
        uneven: bool,
        /// Leave buffer time
        #[arg(long)]
        buffer: bool,
        /// Let the last child end at its natural period end
        #[arg(long)]
        no_preserve_dates: bool,
        /// Print the breakdown without saving it
        #[arg(long)]
        dry_run: bool,
        /// Save even if validation reports issues
        #[arg(long)]
        force: bool,
    },
    /// Suggest breakdown configurations from the patient's history
    Suggest {
        /// Goal ID
        id: String,
    },
    /// Change a goal's status and cascade completion upward
    SetStatus {
        /// Goal ID
        id: String,
        /// New status (pending, active, completed, cancelled, on-hold)
        status: String,
        /// Confirm every promotion without asking
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let mut storage = JsonStore::new(&cli.data_dir).await?;

    match cli.command {
        Commands::Add { patient, title, start, end, rate } => {
            if start > end {
                bail!("start date {} is after end date {}", start, end);
            }
            if rate > 100 {
                bail!("rate must be between 0 and 100");
            }
            let patient_id = match patient {
                Some(p) => p.parse().map_err(|_| anyhow!("Invalid patient ID"))?,
                None => PatientId::new(),
            };
            let mut goal = Goal::long_term(patient_id, title, start, end);
            goal.target_completion_rate = rate;
            storage.create_goals(std::slice::from_ref(&goal)).await?;
            println!("Added goal: {} (patient {}) - {}", goal.id, goal.patient_id, goal.title);
        }
        Commands::List { patient, tier } => {
            let patient: Option<PatientId> = patient
                .map(|p| p.parse().map_err(|_| anyhow!("Invalid patient ID")))
                .transpose()?;
            let tier: Option<Tier> = tier.map(|t| t.parse()).transpose()?;
            let goals: Vec<Goal> = storage
                .list_goals()
                .await?
                .into_iter()
                .filter(|g| patient.map_or(true, |p| g.patient_id == p))
                .filter(|g| tier.map_or(true, |t| g.tier == t))
                .collect();

            println!("Goals ({})", goals.len());
            for goal in goals {
                println!("  {}", format_line(&goal));
            }
        }
        Commands::Show { id } => {
            let goal = load(&storage, &id).await?;
            println!("Goal: {}", goal.id);
            println!("  Title: {}", goal.title);
            println!("  Patient: {}", goal.patient_id);
            println!("  Tier: {}", goal.tier);
            if let Some(parent) = goal.parent_id {
                println!("  Parent: {} (#{})", parent, goal.sequence_number.unwrap_or(0));
            }
            println!("  Dates: {}", format_dates(&goal));
            println!("  Status: {}", goal.status);
            println!("  Target rate: {}%", goal.target_completion_rate);
            if let Some(rate) = goal.actual_completion_rate {
                println!("  Actual rate: {}%", rate);
            }
            if let Some(at) = goal.completed_at {
                println!("  Completed: {}", at);
            }
            let children = storage.fetch_children(goal.id).await?;
            if !children.is_empty() {
                println!("  Children:");
                for child in children {
                    println!("    {}", format_line(&child));
                }
            }
        }
        Commands::Breakdown { id, children, uneven, buffer, no_preserve_dates, dry_run, force } => {
            let parent = load(&storage, &id).await?;
            let mut config = BreakdownConfig::for_tier(parent.tier)
                .ok_or_else(|| anyhow!("{} goals cannot be broken down", parent.tier))?;
            if let Some(n) = children {
                config.child_count = n;
            }
            config.distribute_progress_evenly = !uneven;
            config.include_buffer_time = buffer;
            config.preserve_original_dates = !no_preserve_dates;

            if !storage.fetch_children(parent.id).await?.is_empty() {
                bail!("goal {} has already been broken down", parent.id);
            }

            let result = decompose(&parent, &config)?;
            for warning in &result.warnings {
                println!("Warning: {}", warning);
            }
            for spec in &result.children {
                println!(
                    "  #{} {} | {} - {} | {}%",
                    spec.sequence_number.unwrap_or(0),
                    spec.title,
                    spec.start_date,
                    spec.end_date,
                    spec.target_completion_rate
                );
            }

            let report = validate(&parent, &result.children);
            for issue in &report.issues {
                println!("Issue: {}", issue);
            }
            if dry_run {
                return Ok(());
            }
            if !report.is_valid && !force {
                bail!("breakdown has {} issue(s); fix them or pass --force", report.issues.len());
            }

            let goals: Vec<Goal> = result.children.into_iter().map(|s| s.into_goal()).collect();
            storage.create_goals(&goals).await?;
            info!("Saved {} child goals under {}", goals.len(), parent.id);
            println!("Created {} goals", goals.len());
        }
        Commands::Suggest { id } => {
            let goal = load(&storage, &id).await?;
            let history: Vec<Goal> = storage
                .fetch_goals_by_patient_and_tier(
                    goal.patient_id,
                    goal.tier,
                    &StatusFilter::Only(vec![GoalStatus::Completed, GoalStatus::Cancelled]),
                )
                .await?
                .into_iter()
                .filter(|g| g.id != goal.id)
                .collect();

            let set = suggest(&goal, Some(&history))?;
            println!("Suggestions for {} ({} past goals)", goal.id, history.len());
            for (i, (config, reason)) in set.iter().enumerate() {
                println!(
                    "  {}. {} children, even={}, buffer={}, preserve dates={}",
                    i + 1,
                    config.child_count,
                    config.distribute_progress_evenly,
                    config.include_buffer_time,
                    config.preserve_original_dates
                );
                println!("     {}", reason);
            }
        }
        Commands::SetStatus { id, status, yes } => {
            let goal = load(&storage, &id).await?;
            let status: GoalStatus = status.parse()?;

            let mut patch = GoalPatch::status(status);
            match status {
                GoalStatus::Completed => {
                    patch = GoalPatch::completed(100);
                }
                GoalStatus::Cancelled => {
                    patch.actual_completion_rate = Some(0);
                }
                _ => {}
            }
            let updated = storage.update_goal(goal.id, &patch).await?;
            println!("{} -> {}", updated.id, updated.status);

            let archiver = JsonStore::new(&cli.data_dir).await?;
            let report = if yes {
                CascadeEngine::new(storage, AutoConfirm, archiver)
                    .on_status_changed(&updated)
                    .await?
            } else {
                CascadeEngine::new(storage, PromptConfirmer, archiver)
                    .on_status_changed(&updated)
                    .await?
            };

            for promotion in &report.promotions {
                println!(
                    "Completed {} goal {} ({}%)",
                    promotion.parent_tier, promotion.parent_id, promotion.actual_completion_rate
                );
            }
            match report.termination {
                CascadeTermination::NoAction => {}
                CascadeTermination::Declined(p) => println!("Left {} open", p.parent_id),
                CascadeTermination::AwaitingConfirmation(p) => {
                    println!("Completion of {} awaits confirmation", p.parent_id)
                }
                CascadeTermination::Archived { root_goal_id, patient_id } => {
                    println!("Archived goal tree {}", root_goal_id);
                    println!("Patient {} needs a new long-term goal", patient_id);
                }
            }
        }
    }

    Ok(())
}

/// Asks on the terminal whether to complete a parent goal.
struct PromptConfirmer;

#[async_trait]
impl PromotionConfirmer for PromptConfirmer {
    async fn request_confirmation(&self, proposal: &PromotionProposal) -> Confirmation {
        let question = format!(
            "All {} children of {} goal '{}' are closed ({} completed, {} cancelled). Mark it completed at {}%? [y/N] ",
            proposal.completed_children + proposal.cancelled_children,
            proposal.parent_tier,
            proposal.parent_title,
            proposal.completed_children,
            proposal.cancelled_children,
            proposal.actual_completion_rate
        );
        let mut stdout = tokio::io::stdout();
        if stdout.write_all(question.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
            return Confirmation::NoResponse;
        }

        let mut line = String::new();
        match BufReader::new(tokio::io::stdin()).read_line(&mut line).await {
            Ok(0) | Err(_) => Confirmation::NoResponse,
            Ok(_) => match line.trim().to_lowercase().as_str() {
                "y" | "yes" => Confirmation::Confirmed,
                _ => Confirmation::Declined,
            },
        }
    }
}

async fn load(storage: &JsonStore, id: &str) -> Result<Goal> {
    let goal_id: GoalId = id.parse().map_err(|_| anyhow!("Invalid goal ID"))?;
    storage
        .fetch_goal(goal_id)
        .await?
        .ok_or_else(|| anyhow!("Goal {} not found", goal_id))
}

fn format_dates(goal: &Goal) -> String {
    match goal.date_range() {
        Some((start, end)) => format!("{} - {}", start, end),
        None => "no dates".to_string(),
    }
}

fn format_line(goal: &Goal) -> String {
    format!(
        "{} | {} | {} | {} | {}",
        goal.id,
        goal.tier,
        goal.status,
        format_dates(goal),
        goal.title
    )
}
