use serde::{Deserialize, Serialize};

use crate::entities::issue::{Category, Priority};

const BASE_SCORE: i32 = 50;
const URGENT_SUBCATEGORY_BONUS: i32 = 20;
const KEYWORD_BONUS: i32 = 10;
const LONG_DESCRIPTION_BONUS: i32 = 5;
const LONG_DESCRIPTION_CHARS: usize = 300;

pub const URGENT_SUBCATEGORIES: [&str; 10] = [
    "open-manhole",
    "sewage-overflow",
    "pipe-burst",
    "flooding",
    "live-wire",
    "transformer-fault",
    "road-collapse",
    "fallen-tree",
    "gas-leak",
    "fire-hazard",
];

pub const URGENT_KEYWORDS: [&str; 14] = [
    "urgent",
    "emergency",
    "danger",
    "accident",
    "injury",
    "injured",
    "fire",
    "gas leak",
    "electrocution",
    "collapse",
    "flood",
    "hospital",
    "school",
    "blocked",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriorityScore {
    pub score: i32,
    pub priority: Priority,
    pub matched_keywords: Vec<String>,
}

pub struct ScoreInput<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub category: Category,
    pub subcategory: Option<&'a str>,
    pub upvotes: usize,
}

pub fn category_weight(category: Category) -> i32 {
    match category {
        Category::WaterDrainage | Category::Electricity | Category::PublicSafety => 20,
        Category::Roads => 15,
        Category::Sanitation | Category::StreetLighting => 10,
        Category::Parks | Category::Noise | Category::Other => 0,
    }
}

fn upvote_weight(upvotes: usize) -> i32 {
    match upvotes {
        10.. => 30,
        5..=9 => 20,
        3..=4 => 10,
        _ => 0,
    }
}

pub fn label(score: i32) -> Priority {
    match score {
        80.. => Priority::Urgent,
        60..=79 => Priority::High,
        40..=59 => Priority::Medium,
        _ => Priority::Low,
    }
}

pub fn score_priority(input: &ScoreInput) -> PriorityScore {
    let text = format!("{} {}", input.title, input.description).to_lowercase();
    let matched_keywords: Vec<String> = URGENT_KEYWORDS
        .iter()
        .filter(|keyword| text.contains(*keyword))
        .map(|keyword| keyword.to_string())
        .collect();

    let mut score = BASE_SCORE + category_weight(input.category);
    if input
        .subcategory
        .map_or(false, |sub| URGENT_SUBCATEGORIES.contains(&sub))
    {
        score += URGENT_SUBCATEGORY_BONUS;
    }
    score += KEYWORD_BONUS * matched_keywords.len() as i32;
    score += upvote_weight(input.upvotes);
    if input.description.chars().count() > LONG_DESCRIPTION_CHARS {
        score += LONG_DESCRIPTION_BONUS;
    }

    PriorityScore {
        score,
        priority: label(score),
        matched_keywords,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(title: &'a str, description: &'a str, category: Category) -> ScoreInput<'a> {
        ScoreInput {
            title,
            description,
            category,
            subcategory: None,
            upvotes: 0,
        }
    }

    #[test]
    fn urgent_water_leak_with_upvotes() {
        let mut input = input("urgent water leak", "", Category::WaterDrainage);
        input.upvotes = 6;
        let result = score_priority(&input);
        assert_eq!(result.score, 100);
        assert_eq!(result.priority, Priority::Urgent);
        assert_eq!(result.matched_keywords, vec!["urgent".to_string()]);
    }

    #[test]
    fn plain_report_stays_medium() {
        let result = score_priority(&input(
            "Noisy neighbours",
            "Music every night past midnight",
            Category::Noise,
        ));
        assert_eq!(result.score, 50);
        assert_eq!(result.priority, Priority::Medium);
        assert!(result.matched_keywords.is_empty());
    }

    #[test]
    fn keywords_are_case_insensitive_and_counted_once() {
        let result = score_priority(&input(
            "FIRE near SCHOOL",
            "fire fire fire, children from the school",
            Category::Other,
        ));
        assert_eq!(result.matched_keywords, vec!["fire", "school"]);
        assert_eq!(result.score, 70);
        assert_eq!(result.priority, Priority::High);
    }

    #[test]
    fn subcategory_and_long_description_add_up() {
        let description = "x".repeat(301);
        let mut input = input("Manhole", &description, Category::Sanitation);
        input.subcategory = Some("open-manhole");
        assert_eq!(score_priority(&input).score, 50 + 10 + 20 + 5);
    }

    #[test]
    fn upvote_tiers() {
        assert_eq!(upvote_weight(2), 0);
        assert_eq!(upvote_weight(3), 10);
        assert_eq!(upvote_weight(5), 20);
        assert_eq!(upvote_weight(10), 30);
        assert_eq!(upvote_weight(250), 30);
    }

    #[test]
    fn labels_are_monotonic() {
        let mut previous = label(-100);
        for score in -100..300 {
            let current = label(score);
            assert!(current >= previous, "score {}", score);
            previous = current;
        }
        assert_eq!(label(39), Priority::Low);
        assert_eq!(label(40), Priority::Medium);
        assert_eq!(label(60), Priority::High);
        assert_eq!(label(80), Priority::Urgent);
    }
}
