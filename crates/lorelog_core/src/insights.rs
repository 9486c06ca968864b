//! crates/lorelog_core/src/insights.rs
//!
//! Reading insights: weekly read summaries, the daily activity chart,
//! tag frequencies and recommended tags. All week boundaries are Monday
//! 00:00 UTC.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::Article;
use crate::error::CoreResult;
use crate::ports::{ArticleStore, InsightSummarizer, PortError};

pub const TOP_WEEK_TAGS: usize = 5;
pub const MAX_RECOMMENDED_TAGS: usize = 12;
/// Decay constant for recency weighting, in days.
pub const RECENCY_DECAY_DAYS: f64 = 14.0;
pub const DAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

pub const REASON_MOSTLY_READ: &str = "mostly read";
pub const REASON_RECENTLY_ACTIVE: &str = "recently active";
pub const REASON_FREQUENT: &str = "frequent";

//=========================================================================================
// Result types
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyInsight {
    pub week_start: NaiveDate,
    pub read_count: usize,
    pub top_tags: Vec<String>,
    /// The generated summary, or the bullet summary when generation is
    /// unavailable.
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyActivity {
    pub day: &'static str,
    pub date: NaiveDate,
    pub saved: usize,
    pub read: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecommendedTag {
    pub name: String,
    /// Rounded to two decimals.
    pub score: f64,
    pub count: usize,
    pub read_count: usize,
    pub reasons: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsightStats {
    pub saved: usize,
    pub read: usize,
    pub read_percentage: u32,
    pub weekly_activity: Vec<DailyActivity>,
    pub tags: Vec<TagCount>,
    pub recommended_tags: Vec<RecommendedTag>,
}

//=========================================================================================
// Service
//=========================================================================================

pub struct InsightsService {
    store: Arc<dyn ArticleStore>,
    summarizer: Arc<dyn InsightSummarizer>,
}

impl InsightsService {
    pub fn new(store: Arc<dyn ArticleStore>, summarizer: Arc<dyn InsightSummarizer>) -> Self {
        Self { store, summarizer }
    }

    /// One entry per week with reads, newest week first.
    pub async fn weekly_insights(&self, user_id: Uuid) -> CoreResult<Vec<WeeklyInsight>> {
        let articles = self.store.list_articles(user_id, usize::MAX).await?;

        let mut insights = Vec::new();
        for week in group_reads_by_week(&articles) {
            let bullets = bullet_summary(week.read_count, &week.top_tags);
            let summary = match self.summarizer.summarize(&bullets).await {
                Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
                Ok(_) => bullets,
                Err(PortError::Unavailable(reason)) => {
                    debug!(user_id = %user_id, "Insight summary unavailable: {}", reason);
                    bullets
                }
                Err(e) => {
                    warn!(user_id = %user_id, week = %week.week_start, "Insight summary failed: {}", e);
                    bullets
                }
            };
            insights.push(WeeklyInsight {
                week_start: week.week_start,
                read_count: week.read_count,
                top_tags: week.top_tags,
                summary,
            });
        }
        Ok(insights)
    }

    /// Totals, the activity chart for the week `week_offset` weeks before
    /// the current one, tag frequencies and recommended tags.
    pub async fn stats(
        &self,
        user_id: Uuid,
        week_offset: i32,
        now: DateTime<Utc>,
    ) -> CoreResult<InsightStats> {
        let articles = self.store.list_articles(user_id, usize::MAX).await?;

        let saved = articles.len();
        let read = articles.iter().filter(|a| a.is_read()).count();
        let read_percentage = if saved > 0 {
            (read as f64 / saved as f64 * 100.0).round() as u32
        } else {
            0
        };

        Ok(InsightStats {
            saved,
            read,
            read_percentage,
            weekly_activity: weekly_activity(&articles, week_offset, now),
            tags: tag_frequencies(&articles),
            recommended_tags: recommend_tags(&articles, now),
        })
    }
}

//=========================================================================================
// Pure aggregation
//=========================================================================================

/// The Monday of the week containing `at`.
pub fn start_of_week(at: DateTime<Utc>) -> NaiveDate {
    let date = at.date_naive();
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeekBucket {
    pub week_start: NaiveDate,
    pub read_count: usize,
    pub top_tags: Vec<String>,
}

/// Groups read articles by the week of their read time, newest week first.
pub fn group_reads_by_week(articles: &[Article]) -> Vec<WeekBucket> {
    let mut read: Vec<&Article> = articles.iter().filter(|a| a.is_read()).collect();
    read.sort_by(|a, b| b.read_at.cmp(&a.read_at));

    let mut order: Vec<NaiveDate> = Vec::new();
    let mut weeks: HashMap<NaiveDate, Vec<&Article>> = HashMap::new();
    for article in read {
        let week = start_of_week(article.read_at.unwrap_or(article.created_at));
        weeks
            .entry(week)
            .or_insert_with(|| {
                order.push(week);
                Vec::new()
            })
            .push(article);
    }

    let mut buckets: Vec<WeekBucket> = order
        .into_iter()
        .map(|week_start| {
            let members = weeks.remove(&week_start).unwrap_or_default();
            let top_tags = tag_frequencies(members.iter().copied())
                .into_iter()
                .take(TOP_WEEK_TAGS)
                .map(|t| t.name)
                .collect();
            WeekBucket {
                week_start,
                read_count: members.len(),
                top_tags,
            }
        })
        .collect();
    buckets.sort_by(|a, b| b.week_start.cmp(&a.week_start));
    buckets
}

pub fn bullet_summary(read_count: usize, top_tags: &[String]) -> String {
    let topics = if top_tags.is_empty() {
        "- No tagged articles yet.".to_string()
    } else {
        format!("- Frequent topics: {}", top_tags.join(", "))
    };
    format!("- Articles read this week: {}\n{}", read_count, topics)
}

/// Seven Monday-to-Sunday buckets of saves and reads. A positive
/// `week_offset` looks back, a negative one looks ahead.
pub fn weekly_activity(articles: &[Article], week_offset: i32, now: DateTime<Utc>) -> Vec<DailyActivity> {
    let week_start = start_of_week(now)
        .checked_sub_signed(Duration::weeks(i64::from(week_offset)))
        .unwrap_or(if week_offset > 0 { NaiveDate::MIN } else { NaiveDate::MAX });

    DAY_LABELS
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let date = week_start
                .checked_add_signed(Duration::days(i as i64))
                .unwrap_or(NaiveDate::MAX);
            DailyActivity {
                day: *label,
                date,
                saved: articles
                    .iter()
                    .filter(|a| a.created_at.date_naive() == date)
                    .count(),
                read: articles
                    .iter()
                    .filter(|a| a.read_at.map(|r| r.date_naive()) == Some(date))
                    .count(),
            }
        })
        .collect()
}

/// Tag occurrence counts, most frequent first; ties keep first-seen order.
pub fn tag_frequencies<'a>(articles: impl IntoIterator<Item = &'a Article>) -> Vec<TagCount> {
    let mut counts: Vec<TagCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for article in articles {
        for name in &article.tags {
            match index.get(name.as_str()) {
                Some(&i) => counts[i].count += 1,
                None => {
                    index.insert(name, counts.len());
                    counts.push(TagCount {
                        name: name.clone(),
                        count: 1,
                    });
                }
            }
        }
    }
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

#[derive(Default)]
struct TagScore {
    total: usize,
    read: usize,
    recency: f64,
}

/// Ranks tags by `total + 2*read + 3*recency`, where each occurrence adds
/// `exp(-days_since_read_or_saved / 14)` to the recency weight.
pub fn recommend_tags(articles: &[Article], now: DateTime<Utc>) -> Vec<RecommendedTag> {
    let mut order: Vec<&str> = Vec::new();
    let mut scores: HashMap<&str, TagScore> = HashMap::new();

    for article in articles.iter().filter(|a| !a.tags.is_empty()) {
        let base = article.read_at.unwrap_or(article.created_at);
        let days_ago = ((now - base).num_milliseconds() as f64 / 86_400_000.0).max(0.0);
        let weight = (-days_ago / RECENCY_DECAY_DAYS).exp();

        for name in &article.tags {
            let entry = scores.entry(name.as_str()).or_insert_with(|| {
                order.push(name.as_str());
                TagScore::default()
            });
            entry.total += 1;
            if article.is_read() {
                entry.read += 1;
            }
            entry.recency += weight;
        }
    }

    let mut ranked: Vec<RecommendedTag> = order
        .into_iter()
        .filter_map(|name| scores.get(name).map(|s| (name, s)))
        .map(|(name, s)| {
            let score = s.total as f64 + s.read as f64 * 2.0 + s.recency * 3.0;
            RecommendedTag {
                name: name.to_string(),
                score: (score * 100.0).round() / 100.0,
                count: s.total,
                read_count: s.read,
                reasons: reasons_for(s),
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(MAX_RECOMMENDED_TAGS);
    ranked
}

fn reasons_for(score: &TagScore) -> Vec<&'static str> {
    let mut reasons = Vec::new();
    let half = (score.total as f64 * 0.5).ceil() as usize;
    if score.read >= half.max(2) {
        reasons.push(REASON_MOSTLY_READ);
    }
    if score.recency >= 1.5 {
        reasons.push(REASON_RECENTLY_ACTIVE);
    }
    if reasons.is_empty() && score.total >= 2 {
        reasons.push(REASON_FREQUENT);
    }
    reasons
}
