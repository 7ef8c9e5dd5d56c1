// SPDX-License-Identifier: MIT

use super::*;
use serde_json::json;

#[test]
fn scene_id_accepts_string_or_integer() {
    let from_text: SceneId = serde_json::from_str("\"scene-42\"").unwrap();
    assert_eq!(from_text.as_str(), "scene-42");

    let from_number: SceneId = serde_json::from_str("42").unwrap();
    assert_eq!(from_number.as_str(), "42");
}

#[test]
fn job_key_is_stable_per_scene_and_kind() {
    let a = JobKey::compute(&SceneId::from("1"), UpdateKind::Metadata);
    let b = JobKey::compute(&SceneId::from("1"), UpdateKind::Metadata);
    assert_eq!(a, b);
}

#[test]
fn job_key_differs_by_kind() {
    let metadata = JobKey::compute(&SceneId::from("1"), UpdateKind::Metadata);
    let delete = JobKey::compute(&SceneId::from("1"), UpdateKind::Delete);
    assert_ne!(metadata, delete);
}

#[test]
fn job_key_differs_by_scene() {
    let one = JobKey::compute(&SceneId::from("1"), UpdateKind::Create);
    let two = JobKey::compute(&SceneId::from("2"), UpdateKind::Create);
    assert_ne!(one, two);
}

#[test]
fn job_key_does_not_collide_on_concatenation() {
    // ("ab", …) vs ("a", "b…") must hash differently thanks to the separator
    let ab = JobKey::compute(&SceneId::from("ab"), UpdateKind::Metadata);
    let a = JobKey::compute(&SceneId::from("a"), UpdateKind::Metadata);
    assert_ne!(ab, a);
}

#[test]
fn job_round_trips_through_json() {
    let job = SyncJob::new("scene-7", UpdateKind::Metadata, json!({"title": "t"}), 1_000);
    let text = serde_json::to_string(&job).unwrap();
    let back: SyncJob = serde_json::from_str(&text).unwrap();
    assert_eq!(back, job);
    assert_eq!(back.job_key(), job.job_key());
}

#[test]
fn update_kind_display_matches_wire_form() {
    assert_eq!(UpdateKind::Metadata.to_string(), "metadata");
    assert_eq!(serde_json::to_string(&UpdateKind::Create).unwrap(), "\"create\"");
}
