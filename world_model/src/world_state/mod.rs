//! Projected world state - the disposable read-model rebuilt from the event log.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::entities::{normalize_name, CharacterState, PairKey, RelationshipState};

/// In-story clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryTime {
    pub datetime: NaiveDateTime,
    /// Full English day name, kept in step with `datetime`.
    pub day_of_week: String,
}

impl StoryTime {
    /// Create a clock at an absolute date and time.
    pub fn new(datetime: NaiveDateTime) -> Self {
        Self {
            datetime,
            day_of_week: day_name(datetime.weekday()).to_string(),
        }
    }

    /// Advance the clock using calendar arithmetic (month lengths, leap years).
    ///
    /// Returns `false` and leaves the clock untouched if the result would
    /// fall outside the representable range.
    pub fn advance(&mut self, days: i64, hours: i64, minutes: i64) -> bool {
        let next = Duration::try_days(days)
            .zip(Duration::try_hours(hours))
            .zip(Duration::try_minutes(minutes))
            .and_then(|((d, h), m)| d.checked_add(&h)?.checked_add(&m))
            .and_then(|delta| self.datetime.checked_add_signed(delta));
        match next {
            Some(next) => {
                *self = Self::new(next);
                true
            }
            None => false,
        }
    }
}

fn day_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Where the scene currently takes place.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocationState {
    /// Broad region (e.g. "Downtown Seattle").
    pub area: String,
    /// Specific venue (e.g. "The Rusty Anchor").
    pub place: String,
    /// Spot within the venue (e.g. "corner booth").
    pub position: String,
    /// Notable objects present in the scene.
    pub props: Vec<String>,
}

impl LocationState {
    pub fn has_prop(&self, prop: &str) -> bool {
        self.props.iter().any(|p| p == prop)
    }

    /// Same area, place and position, ignoring props.
    pub fn same_place(&self, area: &str, place: &str, position: &str) -> bool {
        self.area == area && self.place == place && self.position == position
    }
}

/// One day of a generated weather forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub condition: String,
    pub high_c: f32,
    pub low_c: f32,
}

/// Weather forecast generated for an area, starting on a given date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub area: String,
    pub start_date: NaiveDate,
    pub days: Vec<DailyForecast>,
}

impl Forecast {
    /// Forecast entry for a specific date, if covered.
    pub fn for_date(&self, date: NaiveDate) -> Option<&DailyForecast> {
        let offset = (date - self.start_date).num_days();
        usize::try_from(offset).ok().and_then(|i| self.days.get(i))
    }
}

/// "What is true right now" at one point of the story.
///
/// Characters are keyed by normalized name and relationships by [`PairKey`],
/// so replaying an event touches a single entry regardless of history length.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectedState {
    pub time: Option<StoryTime>,

    pub location: Option<LocationState>,

    /// Characters currently in the scene.
    pub characters: HashMap<String, CharacterState>,

    pub relationships: HashMap<PairKey, RelationshipState>,

    /// Latest forecast per area.
    #[serde(default)]
    pub forecasts: BTreeMap<String, Forecast>,
}

impl ProjectedState {
    /// Create an empty state: no clock, no location, nobody present.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a character by name (any casing).
    pub fn character(&self, name: &str) -> Option<&CharacterState> {
        self.characters.get(&normalize_name(name))
    }

    /// Mutable character record, created on first mention.
    pub fn character_entry(&mut self, name: &str) -> &mut CharacterState {
        self.characters
            .entry(normalize_name(name))
            .or_insert_with(|| CharacterState::new(name.trim()))
    }

    /// Remove a character from the scene, returning its last state.
    pub fn remove_character(&mut self, name: &str) -> Option<CharacterState> {
        self.characters.remove(&normalize_name(name))
    }

    pub fn is_present(&self, name: &str) -> bool {
        self.characters.contains_key(&normalize_name(name))
    }

    pub fn relationship(&self, pair: &PairKey) -> Option<&RelationshipState> {
        self.relationships.get(pair)
    }

    /// Mutable relationship record, created on first mention.
    pub fn relationship_entry(&mut self, pair: &PairKey) -> &mut RelationshipState {
        self.relationships
            .entry(pair.clone())
            .or_insert_with(|| RelationshipState::new(pair.clone()))
    }

    /// Mutable location, created empty if none has been set yet.
    pub fn location_entry(&mut self) -> &mut LocationState {
        self.location.get_or_insert_with(LocationState::default)
    }

    /// Names of everybody present, sorted for stable output.
    pub fn present_characters(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.characters.values().map(|c| c.name.as_str()).collect();
        names.sort_unstable();
        names
    }
}
