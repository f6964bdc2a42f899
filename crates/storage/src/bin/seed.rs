use std::fmt;

use chrono::{DateTime, Duration, Utc};
use progress_core::model::{
    Bookmark, BookmarkId, CheckpointRecord, CourseId, LearnerId, LessonId, LessonProgress,
};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    learner_id: LearnerId,
    course_id: CourseId,
    lessons: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidLearnerId { raw: String },
    InvalidCourseId { raw: String },
    InvalidLessons { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidLearnerId { raw } => write!(f, "invalid --learner-id value: {raw}"),
            ArgsError::InvalidCourseId { raw } => write!(f, "invalid --course-id value: {raw}"),
            ArgsError::InvalidLessons { raw } => write!(f, "invalid --lessons value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("PROGRESS_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3".into());
        let mut learner_id = std::env::var("PROGRESS_LEARNER_ID")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map_or_else(|| LearnerId::new(1), LearnerId::new);
        let mut course_id = std::env::var("PROGRESS_COURSE_ID")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map_or_else(|| CourseId::new(1), CourseId::new);
        let mut lessons = std::env::var("PROGRESS_LESSONS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(5);
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--learner-id" => {
                    let value = require_value(&mut args, "--learner-id")?;
                    learner_id = value
                        .parse::<u64>()
                        .map(LearnerId::new)
                        .map_err(|_| ArgsError::InvalidLearnerId { raw: value })?;
                }
                "--course-id" => {
                    let value = require_value(&mut args, "--course-id")?;
                    course_id = value
                        .parse::<u64>()
                        .map(CourseId::new)
                        .map_err(|_| ArgsError::InvalidCourseId { raw: value })?;
                }
                "--lessons" => {
                    let value = require_value(&mut args, "--lessons")?;
                    lessons = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidLessons { raw: value })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value })?;
                    now = Some(parsed.with_timezone(&Utc));
                }
                "-h" | "--help" => {
                    print_usage();
                    std::process::exit(0);
                }
                other => return Err(ArgsError::UnknownArg(other.to_string())),
            }
        }

        Ok(Self {
            db_url,
            learner_id,
            course_id,
            lessons,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:dev.sqlite3)");
    eprintln!("  --learner-id <id>         Learner id to seed (default: 1)");
    eprintln!("  --course-id <id>          Course id to seed (default: 1)");
    eprintln!("  --lessons <n>             Number of lesson records to upsert (default: 5)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  PROGRESS_DB_URL, PROGRESS_LEARNER_ID, PROGRESS_COURSE_ID, PROGRESS_LESSONS");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let titles = [
        "Getting Started",
        "Core Concepts",
        "Worked Examples",
        "Common Pitfalls",
        "Wrap-up and Review",
    ];

    for i in 0..args.lessons {
        let lesson_id = LessonId::new(u64::from(i + 1));
        let title = titles[(i as usize) % titles.len()];
        let duration = 600.0 + f64::from(i) * 120.0;
        let started_at = now - Duration::days(i64::from(args.lessons - i));

        let mut lesson = LessonProgress::new(
            args.learner_id,
            args.course_id,
            lesson_id,
            title,
            i + 1,
            duration,
            started_at,
        )?;

        // earlier lessons are watched further along; the first completes
        let watched = duration * f64::from(args.lessons - i) / f64::from(args.lessons.max(1));
        lesson.record_playback(watched, watched, watched, started_at);
        lesson.try_complete(90, started_at);

        storage.lessons.upsert_snapshot(&lesson).await?;

        let checkpoint = CheckpointRecord::new(
            args.learner_id,
            args.course_id,
            lesson_id,
            watched,
            started_at,
        );
        storage.checkpoints.append_checkpoint(&checkpoint).await?;

        if i == 0 {
            let bookmark = Bookmark::new(
                BookmarkId::generate(),
                watched / 2.0,
                "Revisit this part",
                Some("seeded example bookmark".into()),
                duration,
                started_at,
            )?;
            storage
                .bookmarks
                .append_bookmark(args.learner_id, lesson_id, &bookmark)
                .await?;
        }
    }

    println!(
        "Seeded {} lesson records for learner {} in course {} into {}",
        args.lessons,
        args.learner_id.value(),
        args.course_id.value(),
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
