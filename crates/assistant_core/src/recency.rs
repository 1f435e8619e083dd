use chrono::{DateTime, TimeZone};
use shared::domain::Session;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecencyGroups {
    pub today: Vec<Session>,
    pub yesterday: Vec<Session>,
    /// Two to six days old.
    pub this_week: Vec<Session>,
    /// A week or more old, or with no usable creation time.
    pub older: Vec<Session>,
}

impl RecencyGroups {
    pub fn len(&self) -> usize {
        self.today.len() + self.yesterday.len() + self.this_week.len() + self.older.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Buckets by calendar day in `now`'s timezone. Future timestamps count as today.
pub fn group_by_recency<Tz: TimeZone>(sessions: &[Session], now: &DateTime<Tz>) -> RecencyGroups {
    let today = now.date_naive();
    let mut groups = RecencyGroups::default();
    for session in sessions {
        let Some(created_at) = session.created_at else {
            groups.older.push(session.clone());
            continue;
        };
        let day = created_at.with_timezone(&now.timezone()).date_naive();
        let bucket = match (today - day).num_days() {
            i64::MIN..=0 => &mut groups.today,
            1 => &mut groups.yesterday,
            2..=6 => &mut groups.this_week,
            _ => &mut groups.older,
        };
        bucket.push(session.clone());
    }
    groups
}

/// Case-insensitive substring match on display titles; a blank term keeps everything.
pub fn filter_by_title(sessions: &[Session], term: &str) -> Vec<Session> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return sessions.to_vec();
    }
    sessions
        .iter()
        .filter(|session| session.display_title().to_lowercase().contains(&term))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, FixedOffset, Utc};
    use shared::domain::{Mode, SessionId};

    use super::*;

    fn session(id: &str, title: &str, created_at: Option<DateTime<Utc>>) -> Session {
        Session {
            id: SessionId::new(id),
            title: title.to_string(),
            mode: Mode::General,
            created_at,
            messages: Vec::new(),
        }
    }

    #[test]
    fn buckets_by_calendar_day() {
        let now: DateTime<Utc> = "2024-05-10T12:00:00Z".parse().expect("now");
        let sessions = vec![
            session("a", "a", Some(now - Duration::hours(2))),
            session("b", "b", Some(now - Duration::days(1))),
            session("c", "c", Some(now - Duration::days(4))),
            session("d", "d", Some(now - Duration::days(30))),
            session("e", "e", None),
            session("f", "f", Some(now + Duration::hours(3))),
        ];

        fn ids(bucket: &[Session]) -> Vec<String> {
            bucket.iter().map(|s| s.id.to_string()).collect()
        }

        let groups = group_by_recency(&sessions, &now);
        assert_eq!(ids(&groups.today), vec!["a", "f"]);
        assert_eq!(ids(&groups.yesterday), vec!["b"]);
        assert_eq!(ids(&groups.this_week), vec!["c"]);
        assert_eq!(ids(&groups.older), vec!["d", "e"]);
        assert_eq!(groups.len(), sessions.len());
    }

    #[test]
    fn day_boundaries_follow_the_local_timezone() {
        let dhaka = FixedOffset::east_opt(6 * 3600).expect("offset");
        let now = "2024-05-10T00:30:00+06:00"
            .parse::<DateTime<FixedOffset>>()
            .expect("now")
            .with_timezone(&dhaka);
        // 23:00 local on the previous day.
        let created: DateTime<Utc> = "2024-05-09T17:00:00Z".parse().expect("created");

        let groups = group_by_recency(&[session("a", "a", Some(created))], &now);
        assert_eq!(groups.yesterday.len(), 1);
    }

    #[test]
    fn title_filter_is_case_insensitive() {
        let sessions = vec![
            session("a", "Rust Projects", None),
            session("b", "weather", None),
            session("c", "", None),
        ];
        assert_eq!(filter_by_title(&sessions, "PROJ").len(), 1);
        assert_eq!(filter_by_title(&sessions, "  ").len(), 3);
        assert_eq!(filter_by_title(&sessions, "untitled").len(), 1);
        assert!(filter_by_title(&sessions, "zzz").is_empty());
    }
}
