use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::classify::{self, IMAGE_PLACEHOLDER};
use crate::db::RecordStore;
use crate::error::PersistenceError;
use crate::filter::{self, Thresholds};
use crate::ocr::TextExtractor;
use crate::reddit::{ForumSource, Submission, TopLevelComment};
use crate::record::{CommentRecord, PostRecord};

/// What happened to one submission.
#[derive(Debug)]
pub enum Outcome {
    Stored { id: i64, comments: usize, dropped: usize },
    BelowThreshold { score: i64, minimum: f64 },
    CommentsUnavailable(anyhow::Error),
    PersistFailed(PersistenceError),
}

/// Run stats returned after completion.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub communities: usize,
    pub listing_errors: usize,
    pub seen: usize,
    pub stored: usize,
    pub below_threshold: usize,
    pub failed: usize,
    pub comments_kept: usize,
    pub comments_dropped: usize,
}

impl RunStats {
    fn record(&mut self, outcome: &Outcome) {
        self.seen += 1;
        match outcome {
            Outcome::Stored { comments, dropped, .. } => {
                self.stored += 1;
                self.comments_kept += comments;
                self.comments_dropped += dropped;
            }
            Outcome::BelowThreshold { .. } => self.below_threshold += 1,
            Outcome::CommentsUnavailable(_) | Outcome::PersistFailed(_) => self.failed += 1,
        }
    }
}

fn report(community: &str, submission: &Submission, outcome: &Outcome) {
    match outcome {
        Outcome::Stored { id, comments, dropped } => info!(
            "Inserted post #{} from r/{}: {} ({} comments kept, {} dropped)",
            id, community, submission.title, comments, dropped
        ),
        Outcome::BelowThreshold { score, minimum } => info!(
            "Skipping post: {} (Score: {}, Minimum Required: {:.1})",
            submission.title, score, minimum
        ),
        Outcome::CommentsUnavailable(e) => {
            warn!("Skipping post: {}: comments unavailable: {:#}", submission.title, e)
        }
        Outcome::PersistFailed(e) => warn!("Error inserting {}: {}", submission.title, e),
    }
}

pub struct Ingest<'a, F: ?Sized, X: ?Sized, S: ?Sized> {
    pub forum: &'a F,
    pub extractor: &'a X,
    pub store: &'a S,
    pub thresholds: Thresholds,
    /// Stamped on every record written by this run.
    pub collected_at: DateTime<Utc>,
}

impl<'a, F, X, S> Ingest<'a, F, X, S>
where
    F: ForumSource + ?Sized,
    X: TextExtractor + ?Sized,
    S: RecordStore + ?Sized,
{
    pub fn new(forum: &'a F, extractor: &'a X, store: &'a S, thresholds: Thresholds) -> Self {
        Self {
            forum,
            extractor,
            store,
            thresholds,
            collected_at: Utc::now(),
        }
    }

    /// Process every community in order, one submission at a time.
    pub async fn run(&self, communities: &[String], fetch_limit: usize) -> RunStats {
        let mut stats = RunStats::default();
        for community in communities {
            stats.communities += 1;
            self.community(community, fetch_limit, &mut stats).await;
        }
        stats
    }

    async fn community(&self, community: &str, fetch_limit: usize, stats: &mut RunStats) {
        info!("Scraping r/{}", community);
        let submissions = match self.forum.hot(community, fetch_limit).await {
            Ok(s) => s,
            Err(e) => {
                warn!("Skipping r/{}: listing failed: {:#}", community, e);
                stats.listing_errors += 1;
                return;
            }
        };

        let pb = ProgressBar::new(submissions.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        pb.set_message(community.to_string());

        for submission in &submissions {
            let outcome = self.submission(community, submission).await;
            report(community, submission, &outcome);
            stats.record(&outcome);
            pb.inc(1);
        }
        pb.finish_and_clear();
    }

    pub async fn submission(&self, community: &str, submission: &Submission) -> Outcome {
        let age = filter::age_hours(submission.created_at(), Utc::now());

        if !filter::passes(submission.score, age, self.thresholds.post_rate) {
            return Outcome::BelowThreshold {
                score: submission.score,
                minimum: filter::minimum_score(age, self.thresholds.post_rate),
            };
        }

        let mut body = classify::classify(submission, self.extractor).await;
        if body.is_empty() && classify::kind_of(submission) == classify::ContentKind::Image {
            body = IMAGE_PLACEHOLDER.to_string();
        }

        let fetched = match self.forum.top_level_comments(submission).await {
            Ok(c) => c,
            Err(e) => return Outcome::CommentsUnavailable(e),
        };
        let total = fetched.len();
        let comments = self.keep_comments(fetched, age);
        let kept = comments.len();

        let record = PostRecord {
            collected_at: self.collected_at,
            created_at: submission.created_at(),
            community: community.to_string(),
            title: submission.title.clone(),
            url: submission.url.clone(),
            score: submission.score,
            body,
            comments,
        };

        match self.store.insert(&record) {
            Ok(id) => Outcome::Stored {
                id,
                comments: kept,
                dropped: total - kept,
            },
            Err(e) => Outcome::PersistFailed(e),
        }
    }

    /// Comments share the submission's age; failures are dropped in place.
    fn keep_comments(&self, fetched: Vec<TopLevelComment>, age_hours: f64) -> Vec<CommentRecord> {
        let rate = self.thresholds.comment_rate;
        fetched
            .into_iter()
            .filter(|c| {
                let ok = filter::passes(c.score, age_hours, rate);
                if !ok {
                    info!(
                        "Skipping comment with score {} (Minimum Required: {:.1})",
                        c.score,
                        filter::minimum_score(age_hours, rate)
                    );
                }
                ok
            })
            .map(|c| CommentRecord {
                text: c.body,
                score: c.score,
            })
            .collect()
    }
}
