//! Fields derived from file names of the form
//! `<prefix> - <Title> - S01_E02 - <Star> - <Star>.ext`.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static SEASON_EPISODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)S(\d+)_E(\d+)").expect("valid season/episode regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNameFields {
    pub title: Option<String>,
    pub season: Option<i64>,
    pub episode: Option<i64>,
    pub stars: Vec<String>,
}

pub fn parse_file_name(file_name: Option<&str>) -> FileNameFields {
    let Some(file_name) = file_name.filter(|f| !f.is_empty()) else {
        return FileNameFields::default();
    };
    let stem = strip_extension(file_name);
    let parts: Vec<&str> = stem.split(" - ").map(str::trim).collect();

    let title = parts
        .get(1)
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string());
    let (season, episode) = parts
        .get(2)
        .and_then(|se| SEASON_EPISODE.captures(se))
        .map(|caps| (caps[1].parse().ok(), caps[2].parse().ok()))
        .unwrap_or((None, None));
    let stars = parts.iter().skip(3).map(|s| s.to_string()).collect();

    FileNameFields {
        title,
        season,
        episode,
        stars,
    }
}

/// Drop the last `.ext`, if there is one.
fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) if dot + 1 < name.len() => &name[..dot],
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name() {
        let f = parse_file_name(Some("movie - Title - S01_E02 - Alice.mp4"));
        assert_eq!(
            f,
            FileNameFields {
                title: Some("Title".into()),
                season: Some(1),
                episode: Some(2),
                stars: vec!["Alice".into()],
            }
        );
    }

    #[test]
    fn several_stars_and_lowercase_marker() {
        let f = parse_file_name(Some("show - Pilot - s3_e10 - Alice - Bob .mkv"));
        assert_eq!(f.season, Some(3));
        assert_eq!(f.episode, Some(10));
        assert_eq!(f.stars, vec!["Alice", "Bob"]);
    }

    #[test]
    fn missing_parts() {
        let f = parse_file_name(Some("IMG_0001.jpg"));
        assert_eq!(f, FileNameFields::default());

        let f = parse_file_name(Some("clip - Only Title.mov"));
        assert_eq!(f.title.as_deref(), Some("Only Title"));
        assert_eq!(f.season, None);
        assert!(f.stars.is_empty());

        let f = parse_file_name(Some("a - b - no episode - Carol"));
        assert_eq!(f.season, None);
        assert_eq!(f.stars, vec!["Carol"]);
    }

    #[test]
    fn none_is_empty() {
        assert_eq!(parse_file_name(None), FileNameFields::default());
        assert_eq!(parse_file_name(Some("")), FileNameFields::default());
    }

    #[test]
    fn extension_is_only_the_last_dot() {
        let f = parse_file_name(Some("a - v1.2 - S01_E01.mp4"));
        assert_eq!(f.title.as_deref(), Some("v1.2"));
        assert_eq!(f.episode, Some(1));
    }
}
