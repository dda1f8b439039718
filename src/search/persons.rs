//! Finding people inside one video by clothing color, gender and age.

use crate::analysis::{ATTRIBUTE_SOURCE, UNKNOWN_COLOR};
use crate::video_store::{Frame, PersonDetection};
use serde::Serialize;

/// Base colors and the query words that name them. The first word is the
/// stored color name.
pub(crate) const COLOR_WORDS: &[&[&str]] = &[
    &["red", "빨간", "빨강"],
    &["orange", "주황"],
    &["yellow", "노란", "노랑"],
    &["green", "초록", "녹색"],
    &["blue", "파란", "파랑", "청색"],
    &["purple", "보라", "자주"],
    &["pink", "분홍", "핑크"],
    &["black", "검은", "검정"],
    &["white", "흰", "하양", "백색"],
    &["gray", "grey", "회색"],
];

const MALE_WORDS: &[&str] = &["남성", "남자", "male", "man", "men"];
const FEMALE_WORDS: &[&str] = &["여성", "여자", "female", "woman", "women"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeFilter {
    Child,
    Teenager,
    Adult,
    Elderly,
}

impl AgeFilter {
    fn matches(&self, age_group: &str) -> bool {
        match self {
            AgeFilter::Child => age_group == "child",
            AgeFilter::Teenager => age_group == "teenager",
            AgeFilter::Adult => matches!(age_group, "adult" | "young_adult" | "middle_aged"),
            AgeFilter::Elderly => age_group == "elderly",
        }
    }
}

/// What a person search asks for. Criteria of different kinds must all hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersonCriteria {
    pub colors: Vec<&'static str>,
    pub gender: Option<&'static str>,
    pub age: Option<AgeFilter>,
}

/// Whether `word` occurs in `text` as a whole word. Hangul has no word
/// boundaries worth checking, so those words only need to be contained.
fn mentions(text: &str, word: &str) -> bool {
    if !word.is_ascii() {
        return text.contains(word);
    }
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| token == word)
}

/// Base colors named in a query.
pub fn query_colors(query: &str) -> Vec<&'static str> {
    let lower = query.to_lowercase();
    COLOR_WORDS
        .iter()
        .filter(|words| words.iter().any(|w| mentions(&lower, w)))
        .map(|words| words[0])
        .collect()
}

impl PersonCriteria {
    pub fn parse(query: &str) -> Self {
        let lower = query.to_lowercase();
        let any = |words: &[&str]| words.iter().any(|w| mentions(&lower, w));

        let gender = match (any(MALE_WORDS), any(FEMALE_WORDS)) {
            (true, false) => Some("male"),
            (false, true) => Some("female"),
            _ => None,
        };
        let age = if any(&["어린이", "child", "children", "kid", "kids"]) {
            Some(AgeFilter::Child)
        } else if any(&["청소년", "teenager", "teen"]) {
            Some(AgeFilter::Teenager)
        } else if any(&["노인", "elderly", "senior"]) {
            Some(AgeFilter::Elderly)
        } else if any(&["성인", "adult", "adults"]) {
            Some(AgeFilter::Adult)
        } else {
            None
        };

        Self {
            colors: query_colors(query),
            gender,
            age,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty() && self.gender.is_none() && self.age.is_none()
    }

    pub fn matches(&self, person: &PersonDetection) -> bool {
        if self.is_empty() {
            return false;
        }
        let color_ok = self.colors.is_empty()
            || self.colors.iter().any(|color| wears(person, color));
        let gender_ok = self.gender.map_or(true, |g| person.gender == g);
        let age_ok = self.age.map_or(true, |a| a.matches(&person.age_group));
        color_ok && gender_ok && age_ok
    }
}

pub(crate) fn wears(person: &PersonDetection, color: &str) -> bool {
    person.upper_color.eq_ignore_ascii_case(color) || person.lower_color.eq_ignore_ascii_case(color)
}

/// Readable one-line description of a person.
pub fn describe_person(person: &PersonDetection) -> String {
    let mut parts = Vec::new();
    if person.upper_color != UNKNOWN_COLOR {
        parts.push(format!("{} top", person.upper_color));
    }
    if person.lower_color != UNKNOWN_COLOR {
        parts.push(format!("{} bottom", person.lower_color));
    }
    match person.gender.as_str() {
        "male" | "female" => parts.push(person.gender.clone()),
        _ => {}
    }
    match person.estimated_age {
        Some(age) if age > 0 => parts.push(format!("about {} years old", age)),
        _ => parts.push(person.age_group.replace('_', " ")),
    }

    let description = if parts.is_empty() {
        "person".to_string()
    } else {
        parts.join(", ")
    };
    if person.analysis_source == ATTRIBUTE_SOURCE {
        format!("{} (attributes verified)", description)
    } else {
        description
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonMatch {
    pub image_id: i64,
    pub timestamp: f64,
    pub person_index: i64,
    pub bbox: [f64; 4],
    pub confidence: f64,
    pub gender: String,
    pub age_group: String,
    pub estimated_age: Option<i64>,
    pub upper_color: String,
    pub lower_color: String,
    pub analysis_source: String,
    pub setting: String,
    pub lighting: String,
    pub activity_level: String,
    pub description: String,
}

/// Every person matching the criteria, in time order.
pub fn search_persons(frames: &[Frame], criteria: &PersonCriteria) -> Vec<PersonMatch> {
    let mut matches: Vec<PersonMatch> = frames
        .iter()
        .flat_map(|frame| {
            frame
                .persons
                .iter()
                .filter(|p| criteria.matches(p))
                .map(move |p| PersonMatch {
                    image_id: frame.image_id,
                    timestamp: frame.timestamp,
                    person_index: p.person_index,
                    bbox: p.bbox,
                    confidence: p.confidence,
                    gender: p.gender.clone(),
                    age_group: p.age_group.clone(),
                    estimated_age: p.estimated_age,
                    upper_color: p.upper_color.clone(),
                    lower_color: p.lower_color.clone(),
                    analysis_source: p.analysis_source.clone(),
                    setting: frame.scene.setting.to_string(),
                    lighting: frame.scene.lighting.to_string(),
                    activity_level: frame.scene.activity_level.to_string(),
                    description: describe_person(p),
                })
        })
        .collect();
    matches.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::{frame, person};

    #[test]
    fn criteria_from_mixed_language_queries() {
        let criteria = PersonCriteria::parse("주황색 상의 남성");
        assert_eq!(criteria.colors, vec!["orange"]);
        assert_eq!(criteria.gender, Some("male"));
        assert_eq!(criteria.age, None);

        let criteria = PersonCriteria::parse("women in blue or red, adults only");
        assert_eq!(criteria.colors, vec!["red", "blue"]);
        assert_eq!(criteria.gender, Some("female"));
        assert_eq!(criteria.age, Some(AgeFilter::Adult));

        // "bored" is not "red", "woman" is not "man".
        let criteria = PersonCriteria::parse("a bored woman");
        assert!(criteria.colors.is_empty());
        assert_eq!(criteria.gender, Some("female"));

        assert!(PersonCriteria::parse("anything at all").is_empty());
    }

    #[test]
    fn every_kind_of_criterion_must_hold() {
        let mut woman = person(1);
        woman.gender = "female".to_string();
        woman.upper_color = "orange".to_string();
        let man = person(0);

        let criteria = PersonCriteria::parse("orange female");
        assert!(criteria.matches(&woman));
        assert!(!criteria.matches(&man));

        let criteria = PersonCriteria::parse("blue");
        assert!(criteria.matches(&man));
        assert!(criteria.matches(&woman));

        assert!(!PersonCriteria::default().matches(&man));
    }

    #[test]
    fn results_are_in_time_order_with_descriptions() {
        let mut late = frame(9, 130.0, 0.03, 1);
        late.timestamp = 9.0;
        let mut early = frame(2, 130.0, 0.03, 2);
        early.timestamp = 2.0;
        early.persons[1].age_group = "child".to_string();
        early.persons[1].estimated_age = None;

        let frames = vec![late, early];
        let results = search_persons(&frames, &PersonCriteria::parse("red"));
        let times: Vec<f64> = results.iter().map(|r| r.timestamp).collect();
        assert_eq!(times, vec![2.0, 2.0, 9.0]);
        assert_eq!(results[0].description, "red top, blue bottom, male, about 28 years old");
        assert_eq!(results[1].description, "red top, blue bottom, male, child");

        let children = search_persons(&frames, &PersonCriteria::parse("어린이"));
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].image_id, 2);
    }
}
