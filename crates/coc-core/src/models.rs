//! Typed views over materialized responses.
//!
//! A facade only tags a [`GenericRecord`] with its resource kind. Nothing is
//! validated up front; every accessor returns `None` for a missing field.

use chrono::{DateTime, Utc};

use crate::record::GenericRecord;

/// A resource kind that can be built from a materialized record.
pub trait Resource: Sized + Send {
    const KIND: &'static str;

    fn from_record(record: GenericRecord) -> Self;
    fn record(&self) -> &GenericRecord;
    fn into_record(self) -> GenericRecord;
}

macro_rules! resource {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq)]
        pub struct $name(GenericRecord);

        impl Resource for $name {
            const KIND: &'static str = $kind;

            fn from_record(record: GenericRecord) -> Self {
                Self(record)
            }

            fn record(&self) -> &GenericRecord {
                &self.0
            }

            fn into_record(self) -> GenericRecord {
                self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = GenericRecord;

            fn deref(&self) -> &GenericRecord {
                &self.0
            }
        }
    };
}

resource!(
    /// `GET /players/{tag}`
    Player,
    "player"
);
resource!(
    /// `GET /clans/{tag}`
    Clan,
    "clan"
);
resource!(
    /// `GET /clans/{tag}/members`
    ClanMembers,
    "clan_members"
);
resource!(
    /// `GET /clans/{tag}/currentwar`
    ClanWar,
    "clan_war"
);
resource!(
    /// `GET /clans/{tag}/warlog`
    ClanWarLog,
    "clan_war_log"
);
resource!(
    /// `GET /clans/{tag}/currentwar/leaguegroup`
    ClanWarLeagueGroup,
    "clan_war_league_group"
);
resource!(
    /// `GET /clanwarleagues/wars/{tag}`
    ClanWarLeagueWar,
    "clan_war_league_war"
);

impl Player {
    pub fn tag(&self) -> Option<&str> {
        self.get_str("tag")
    }

    pub fn name(&self) -> Option<&str> {
        self.get_str("name")
    }

    pub fn town_hall_level(&self) -> Option<i64> {
        self.get_i64("townHallLevel")
    }

    pub fn exp_level(&self) -> Option<i64> {
        self.get_i64("expLevel")
    }

    pub fn trophies(&self) -> Option<i64> {
        self.get_i64("trophies")
    }

    pub fn best_trophies(&self) -> Option<i64> {
        self.get_i64("bestTrophies")
    }

    pub fn war_stars(&self) -> Option<i64> {
        self.get_i64("warStars")
    }

    pub fn role(&self) -> Option<&str> {
        self.get_str("role")
    }

    /// Absent when the player is not in a clan.
    pub fn clan(&self) -> Option<&GenericRecord> {
        self.get_record("clan")
    }

    pub fn league(&self) -> Option<&GenericRecord> {
        self.get_record("league")
    }

    pub fn troops(&self) -> impl Iterator<Item = &GenericRecord> {
        self.get_records("troops")
    }

    pub fn heroes(&self) -> impl Iterator<Item = &GenericRecord> {
        self.get_records("heroes")
    }

    pub fn spells(&self) -> impl Iterator<Item = &GenericRecord> {
        self.get_records("spells")
    }
}

impl Clan {
    pub fn tag(&self) -> Option<&str> {
        self.get_str("tag")
    }

    pub fn name(&self) -> Option<&str> {
        self.get_str("name")
    }

    pub fn description(&self) -> Option<&str> {
        self.get_str("description")
    }

    pub fn clan_level(&self) -> Option<i64> {
        self.get_i64("clanLevel")
    }

    pub fn clan_points(&self) -> Option<i64> {
        self.get_i64("clanPoints")
    }

    /// Member count as reported by the clan summary.
    pub fn member_count(&self) -> Option<i64> {
        self.get_i64("members")
    }

    pub fn member_list(&self) -> impl Iterator<Item = &GenericRecord> {
        self.get_records("memberList")
    }

    pub fn war_league(&self) -> Option<&GenericRecord> {
        self.get_record("warLeague")
    }

    pub fn is_war_log_public(&self) -> Option<bool> {
        self.get_bool("isWarLogPublic")
    }
}

/// Query parameters for the paged list endpoints.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page {
    pub limit: Option<u32>,
    pub after: Option<String>,
    pub before: Option<String>,
}

impl Page {
    pub fn limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Default::default()
        }
    }

    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut q = Vec::new();
        if let Some(l) = self.limit {
            q.push(("limit", l.to_string()));
        }
        if let Some(a) = &self.after {
            q.push(("after", a.clone()));
        }
        if let Some(b) = &self.before {
            q.push(("before", b.clone()));
        }
        q
    }
}

fn cursor<'a>(record: &'a GenericRecord, which: &str) -> Option<&'a str> {
    record
        .get_record("paging")?
        .get_record("cursors")?
        .get_str(which)
}

/// Page following `record`, if its cursors point further.
fn next_page(record: &GenericRecord, limit: Option<u32>) -> Option<Page> {
    cursor(record, "after").map(|after| Page {
        limit,
        after: Some(after.to_string()),
        before: None,
    })
}

impl ClanMembers {
    pub fn items(&self) -> impl Iterator<Item = &GenericRecord> {
        self.get_records("items")
    }

    pub fn paging(&self) -> Option<&GenericRecord> {
        self.get_record("paging")
    }

    pub fn next_page(&self, limit: Option<u32>) -> Option<Page> {
        next_page(self, limit)
    }
}

impl ClanWarLog {
    pub fn items(&self) -> impl Iterator<Item = &GenericRecord> {
        self.get_records("items")
    }

    pub fn paging(&self) -> Option<&GenericRecord> {
        self.get_record("paging")
    }

    pub fn next_page(&self, limit: Option<u32>) -> Option<Page> {
        next_page(self, limit)
    }
}

impl ClanWar {
    /// `notInWar`, `preparation`, `inWar` or `warEnded`.
    pub fn state(&self) -> Option<&str> {
        self.get_str("state")
    }

    pub fn team_size(&self) -> Option<i64> {
        self.get_i64("teamSize")
    }

    pub fn clan(&self) -> Option<&GenericRecord> {
        self.get_record("clan")
    }

    pub fn opponent(&self) -> Option<&GenericRecord> {
        self.get_record("opponent")
    }

    pub fn preparation_start_time(&self) -> Option<DateTime<Utc>> {
        self.get_timestamp("preparationStartTime")
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.get_timestamp("startTime")
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.get_timestamp("endTime")
    }
}

impl ClanWarLeagueGroup {
    pub fn state(&self) -> Option<&str> {
        self.get_str("state")
    }

    pub fn season(&self) -> Option<&str> {
        self.get_str("season")
    }

    pub fn clans(&self) -> impl Iterator<Item = &GenericRecord> {
        self.get_records("clans")
    }

    /// War tags per round. Unscheduled wars are reported as `#0` and skipped.
    pub fn war_tags(&self) -> Vec<Vec<&str>> {
        self.get_records("rounds")
            .map(|round| {
                round
                    .get_list("warTags")
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|t| t.as_str())
                    .filter(|t| *t != "#0")
                    .collect()
            })
            .collect()
    }
}

impl ClanWarLeagueWar {
    pub fn state(&self) -> Option<&str> {
        self.get_str("state")
    }

    pub fn team_size(&self) -> Option<i64> {
        self.get_i64("teamSize")
    }

    pub fn clan(&self) -> Option<&GenericRecord> {
        self.get_record("clan")
    }

    pub fn opponent(&self) -> Option<&GenericRecord> {
        self.get_record("opponent")
    }

    pub fn preparation_start_time(&self) -> Option<DateTime<Utc>> {
        self.get_timestamp("preparationStartTime")
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.get_timestamp("startTime")
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.get_timestamp("endTime")
    }

    pub fn war_start_time(&self) -> Option<DateTime<Utc>> {
        self.get_timestamp("warStartTime")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::materialize_record;
    use serde_json::json;

    fn build<R: Resource>(v: serde_json::Value) -> R {
        R::from_record(materialize_record(v).unwrap())
    }

    #[test]
    fn player_accessors() {
        let p: Player = build(json!({
            "tag": "#ABC123",
            "name": "Foo",
            "townHallLevel": 10,
            "heroes": [{"name": "Barbarian King", "level": 40}]
        }));
        assert_eq!(p.tag(), Some("#ABC123"));
        assert_eq!(p.name(), Some("Foo"));
        assert_eq!(p.town_hall_level(), Some(10));
        assert!(p.clan().is_none());
        assert_eq!(p.heroes().count(), 1);
        assert_eq!(p.troops().count(), 0);
        assert_eq!(Player::KIND, "player");
    }

    #[test]
    fn paged_lists_expose_cursors() {
        let log: ClanWarLog = build(json!({
            "items": [{"result": "win"}, {"result": "lose"}],
            "paging": {"cursors": {"after": "eyJwb3MiOjJ9"}}
        }));
        assert_eq!(log.items().count(), 2);
        assert_eq!(
            log.next_page(Some(2)),
            Some(Page {
                limit: Some(2),
                after: Some("eyJwb3MiOjJ9".to_string()),
                before: None
            })
        );

        let members: ClanMembers = build(json!({"items": [], "paging": {"cursors": {}}}));
        assert!(members.next_page(None).is_none());
    }

    #[test]
    fn page_renders_query() {
        let page = Page {
            limit: Some(5),
            after: None,
            before: Some("b".to_string()),
        };
        assert_eq!(
            page.to_query(),
            vec![("limit", "5".to_string()), ("before", "b".to_string())]
        );
        assert!(Page::default().to_query().is_empty());
    }

    #[test]
    fn league_group_war_tags_skip_placeholders() {
        let g: ClanWarLeagueGroup = build(json!({
            "state": "inWar",
            "rounds": [
                {"warTags": ["#8QJ", "#9PY"]},
                {"warTags": ["#0", "#0"]}
            ]
        }));
        assert_eq!(g.war_tags(), vec![vec!["#8QJ", "#9PY"], vec![]]);
    }

    #[test]
    fn war_times_parse() {
        let w: ClanWar = build(json!({
            "state": "inWar",
            "startTime": "20240105T083000.000Z",
            "endTime": "20240106T083000.000Z"
        }));
        let (s, e) = (w.start_time().unwrap(), w.end_time().unwrap());
        assert_eq!((e - s).num_hours(), 24);
        assert!(w.preparation_start_time().is_none());
    }
}
