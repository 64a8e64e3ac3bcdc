use crate::infra::{InMemoryAuditRepository, LoggingNotificationPublisher};
use branch_audit::access::{Actor, Role, SessionContext};
use branch_audit::audits::domain::Responses;
use branch_audit::audits::scoring::round2;
use branch_audit::audits::{
    score_audit, AnalyticsReport, AuditAction, AuditId, AuditService, BranchId, BranchRef,
    NewAudit, PhotoUpload, Question, QuestionId, QuestionKind, ScoreBasis, ScoreSummary, Section,
    SectionId, Survey, SurveyId,
};
use branch_audit::config::{AppConfig, SyncConfig};
use branch_audit::error::AppError;
use branch_audit::sync::{
    JsonFileQueueStore, MemoryQueueStore, QueueStore, RemoteWriter, ServiceWriter, SyncError,
    SyncPayload, SyncQueue,
};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Survey template JSON file
    #[arg(long)]
    pub(crate) survey: PathBuf,
    /// Audit JSON file, or a JSON object mapping question ids to answers
    #[arg(long)]
    pub(crate) responses: PathBuf,
    /// Print the score as JSON instead of a summary
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Persist the offline queue to this JSON file instead of memory
    #[arg(long)]
    pub(crate) queue_file: Option<PathBuf>,
    /// Number of sync writes that fail before connectivity returns
    #[arg(long, default_value_t = 2)]
    pub(crate) outage_writes: usize,
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let survey: Survey = serde_json::from_str(&std::fs::read_to_string(&args.survey)?)?;
    let responses = parse_responses(&std::fs::read_to_string(&args.responses)?)?;

    if let Err(err) = survey.validate() {
        eprintln!("warning: survey template is not valid ({err}); scoring anyway");
    }

    let summary = ScoreSummary::headline(score_audit(&survey, &responses));
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        render_score(&survey, &summary);
    }
    Ok(())
}

/// Accepts either a full audit record or a bare response map.
fn parse_responses(raw: &str) -> Result<Responses, AppError> {
    let value: Value = serde_json::from_str(raw)?;
    let responses = match value.get("responses") {
        Some(inner) if inner.is_object() => inner.clone(),
        _ => value,
    };
    Ok(serde_json::from_value(responses)?)
}

fn render_score(survey: &Survey, summary: &ScoreSummary) {
    let unweighted = &summary.score.unweighted;
    let weighted = &summary.score.weighted;
    println!("Compliance score for \"{}\"", survey.title);
    println!(
        "- Unweighted: {} yes / {} no -> {:.2}%",
        unweighted.yes_answers,
        unweighted.no_answers,
        round2(unweighted.compliance_percentage)
    );
    println!(
        "- Weighted: {} of {} points -> {:.2}%",
        weighted.weighted_earned_points,
        weighted.weighted_possible_points,
        round2(weighted.weighted_compliance_percentage)
    );
    let basis = match summary.basis {
        ScoreBasis::Weighted => "weighted",
        ScoreBasis::Unweighted => "unweighted",
    };
    println!(
        "Headline ({basis}): {:.2}%",
        round2(summary.headline_percentage)
    );
}

/// Fails the first `remaining` writes as if the device were offline.
struct OutageWriter<W> {
    inner: W,
    remaining: AtomicUsize,
}

impl<W: RemoteWriter> RemoteWriter for OutageWriter<W> {
    fn write(&self, payload: &SyncPayload) -> Result<(), SyncError> {
        let offline = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| left.checked_sub(1))
            .is_ok();
        if offline {
            return Err(SyncError::Remote("network unreachable".to_string()));
        }
        self.inner.write(payload)
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    match args.queue_file {
        Some(path) => {
            println!("Offline queue file: {}", path.display());
            let queue = SyncQueue::open(JsonFileQueueStore::new(path), config.sync)?;
            demo_with_queue(queue, &config.sync, args.outage_writes)
        }
        None => {
            let queue = SyncQueue::open(MemoryQueueStore::default(), config.sync)?;
            demo_with_queue(queue, &config.sync, args.outage_writes)
        }
    }
}

fn demo_with_queue<S: QueueStore>(
    queue: SyncQueue<S>,
    sync: &SyncConfig,
    outage_writes: usize,
) -> Result<(), AppError> {
    let repository = Arc::new(InMemoryAuditRepository::default());
    let notifications = Arc::new(LoggingNotificationPublisher::default());
    let service = AuditService::new(repository, notifications.clone());

    let admin = Actor::new("u-admin", Role::Admin);
    let manager = Actor::new("u-morgan", Role::BranchManager).at_branch("br-riverside");
    let auditor = Actor::new("u-sam", Role::Auditor);
    let started = Utc::now();

    println!("Branch audit demo");
    let survey = service.create_survey(&admin, demo_survey())?;
    println!(
        "- Template \"{}\" with {} sections and {} questions",
        survey.title,
        survey.sections.len(),
        survey.questions().count()
    );

    let audit = service.create_audit(
        &manager,
        NewAudit {
            survey_id: survey.id.clone(),
            branch: BranchRef {
                branch_id: BranchId("br-riverside".to_string()),
                zone_id: Some("zone-north".to_string()),
                organization_id: Some("org-demo".to_string()),
            },
            auditor: auditor.user_id.clone(),
        },
        started,
    )?;
    println!(
        "- {} scheduled audit {} for {}",
        manager.user_id.0, audit.id.0, auditor.user_id.0
    );

    let session = SessionContext::begin(auditor.clone(), started, Duration::hours(8));
    println!("\nAuditor works offline; edits are queued locally");
    for (priority, payload) in offline_edits(&audit.id) {
        let entry = queue.enqueue(payload, priority, started)?;
        println!(
            "  queued #{} (priority {}) for {}",
            entry.sequence,
            entry.priority,
            entry.payload.audit_id().0
        );
    }

    let writer = OutageWriter {
        inner: ServiceWriter::new(&service, &session, started),
        remaining: AtomicUsize::new(outage_writes),
    };
    drain_round(&queue, &writer, started, "connectivity lost")?;

    let later = started + sync.backoff_after(1) + Duration::seconds(1);
    let writer = ServiceWriter::new(&service, &session, later);
    drain_round(&queue, &writer, later, "connectivity restored")?;

    for dead in queue.dead_letters() {
        println!(
            "  dead letter #{} after {} attempts: {}",
            dead.sequence,
            dead.attempts,
            dead.last_error.as_deref().unwrap_or("unknown error")
        );
    }

    let progress = service.progress(&auditor, &audit.id)?;
    println!("\nWizard progress: {}/{} answered", progress.answered, progress.total);
    for section in &progress.sections {
        let state = if section.is_complete() { "complete" } else { "open" };
        println!(
            "  - {}: {}/{} ({state})",
            section.title, section.answered, section.total
        );
    }

    println!("\nReview");
    let steps = [
        (&auditor, AuditAction::Complete),
        (&auditor, AuditAction::Submit),
        (&manager, AuditAction::Approve),
    ];
    for (actor, action) in steps {
        match service.transition(actor, &audit.id, action, later) {
            Ok(updated) => println!(
                "  {} -> {}",
                actor.user_id.0,
                updated.status.label()
            ),
            Err(err) => {
                println!("  {} could not act: {err}", actor.user_id.0);
                return Ok(());
            }
        }
    }

    let summary = service.score(&manager, &audit.id)?;
    println!();
    render_score(&survey, &summary);

    let report = service.analytics(&admin)?;
    println!("\n{}", analytics_headline(&report));
    report
        .write_csv(std::io::stdout())
        .map_err(std::io::Error::from)?;

    let events = notifications.events();
    if events.is_empty() {
        println!("\nNotifications: none dispatched");
    } else {
        println!("\nNotifications:");
        for event in events {
            println!("  - template={} -> {:?}", event.template, event.recipient);
        }
    }

    let ended = session.end(later);
    println!(
        "\nSession for {} lasted {}s",
        ended.user_id.0, ended.duration_secs
    );
    Ok(())
}

/// `completion_rate` is already a percentage.
fn analytics_headline(report: &AnalyticsReport) -> String {
    format!(
        "Analytics: {} audits | {:.2}% completion",
        report.total_audits, report.completion_rate
    )
}

fn drain_round<S: QueueStore, W: RemoteWriter>(
    queue: &SyncQueue<S>,
    writer: &W,
    now: DateTime<Utc>,
    label: &str,
) -> Result<(), AppError> {
    let report = queue.drain(writer, now)?;
    println!(
        "  sync ({label}): {} synced | {} retrying | {} evicted | {} deferred",
        report.synced.len(),
        report.retrying.len(),
        report.evicted.len(),
        report.deferred
    );
    Ok(())
}

fn offline_edits(audit_id: &AuditId) -> Vec<(u8, SyncPayload)> {
    let answers = |pairs: &[(&str, Value)]| SyncPayload::AuditResponses {
        audit_id: audit_id.clone(),
        responses: pairs
            .iter()
            .map(|(id, value)| (QuestionId(id.to_string()), value.clone()))
            .collect(),
        na_reasons: Default::default(),
    };

    let mut edits = vec![
        (
            2,
            answers(&[
                ("exit_clear", json!("yes")),
                ("extinguisher_tagged", json!("no")),
            ]),
        ),
        (
            1,
            answers(&[
                ("cash_drawer_logged", json!("yes")),
                ("staff_on_shift", json!(4)),
            ]),
        ),
        (1, answers(&[("signage_condition", json!("Faded"))])),
    ];

    if let Ok(photo) = PhotoUpload::new(
        audit_id.clone(),
        QuestionId("exit_clear".to_string()),
        "rear-exit.jpg",
        vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10],
    ) {
        edits.push((0, SyncPayload::PhotoUpload(photo)));
    }
    edits
}

fn demo_survey() -> Survey {
    let question = |id: &str, text: &str, kind: QuestionKind| Question {
        id: QuestionId(id.to_string()),
        text: text.to_string(),
        kind,
        required: true,
        yes_weight: 0,
        no_weight: 0,
        options: Vec::new(),
    };

    Survey {
        id: SurveyId("sv-branch-safety".to_string()),
        title: "Branch safety walk".to_string(),
        sections: vec![
            Section {
                id: SectionId("safety".to_string()),
                title: "Safety".to_string(),
                questions: vec![
                    Question {
                        yes_weight: 10,
                        ..question("exit_clear", "Are emergency exits clear?", QuestionKind::YesNo)
                    },
                    Question {
                        no_weight: 5,
                        ..question(
                            "extinguisher_tagged",
                            "Is any extinguisher past its inspection date?",
                            QuestionKind::YesNo,
                        )
                    },
                ],
            },
            Section {
                id: SectionId("operations".to_string()),
                title: "Operations".to_string(),
                questions: vec![
                    Question {
                        yes_weight: 8,
                        ..question(
                            "cash_drawer_logged",
                            "Was the cash drawer count logged?",
                            QuestionKind::YesNo,
                        )
                    },
                    question("staff_on_shift", "Staff on shift", QuestionKind::Number),
                ],
            },
            Section {
                id: SectionId("presentation".to_string()),
                title: "Presentation".to_string(),
                questions: vec![Question {
                    required: false,
                    options: vec!["Good".to_string(), "Faded".to_string(), "Damaged".to_string()],
                    ..question(
                        "signage_condition",
                        "Exterior signage condition",
                        QuestionKind::MultipleChoice,
                    )
                }],
            },
        ],
    }
}
