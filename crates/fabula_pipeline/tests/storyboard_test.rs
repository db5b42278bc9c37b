//! Tests for the stage-2 transform.

use fabula_core::{
    AnalyzedText, Appearance, AudioKind, Chapter, Character, DialogueLine, DialogueMode, Gender,
    JobOptions, Scene,
};
use fabula_pipeline::StoryboardBuilder;
use std::collections::HashMap;

const PAUSE: &str = "…";

fn scene(scene_id: u32) -> Scene {
    Scene {
        scene_id,
        location: "harbor".to_string(),
        time: "dawn".to_string(),
        description: "mist over the water".to_string(),
        atmosphere: "quiet".to_string(),
        lighting: "pale light".to_string(),
        characters: vec!["Mara".to_string()],
        narration: String::new(),
        dialogue: Vec::new(),
        actions: Vec::new(),
        character_appearances: HashMap::new(),
    }
}

fn analysis(scenes: Vec<Scene>) -> AnalyzedText {
    AnalyzedText {
        characters: vec![Character {
            name: "Mara".to_string(),
            appearance: Appearance {
                gender: Gender::Female,
                hair: "long red hair".to_string(),
                clothing: "grey cloak".to_string(),
                ..Appearance::default()
            },
            personality: "curious".to_string(),
            role: "protagonist".to_string(),
            age_variants: Vec::new(),
        }],
        chapters: vec![Chapter {
            chapter_id: 1,
            title: "One".to_string(),
            scenes,
        }],
        plot_points: Vec::new(),
    }
}

fn dialogue_scene() -> Scene {
    let mut s = scene(1);
    s.dialogue = vec![
        DialogueLine {
            speaker: "Mara".to_string(),
            text: "Is anyone there".to_string(),
        },
        DialogueLine {
            speaker: "Mara".to_string(),
            text: "I can hear you".to_string(),
        },
    ];
    s
}

#[test]
fn merged_mode_emits_one_unit_with_the_first_speaker() {
    let options = JobOptions::default();
    let builder = StoryboardBuilder::new(&options, PAUSE);
    let storyboard = builder.build(&analysis(vec![dialogue_scene()]));

    let audio = &storyboard.chapters[0].scenes[0].audio;
    assert_eq!(audio.len(), 1);
    assert_eq!(audio[0].kind, AudioKind::Dialogue);
    assert_eq!(audio[0].speaker.as_deref(), Some("Mara"));
    assert_eq!(audio[0].text, format!("Is anyone there{PAUSE}I can hear you"));
}

#[test]
fn per_line_mode_emits_an_ordered_list() {
    let options = JobOptions {
        dialogue_mode: DialogueMode::PerLine,
        ..JobOptions::default()
    };
    let builder = StoryboardBuilder::new(&options, PAUSE);
    let storyboard = builder.build(&analysis(vec![dialogue_scene()]));

    let audio = &storyboard.chapters[0].scenes[0].audio;
    assert_eq!(audio.len(), 2);
    assert_eq!(audio[0].text, "Is anyone there");
    assert_eq!(audio[1].text, "I can hear you");
}

#[test]
fn narration_without_dialogue_becomes_a_narration_unit() {
    let mut s = scene(1);
    s.narration = "The town slept on.".to_string();
    let options = JobOptions::default();
    let builder = StoryboardBuilder::new(&options, PAUSE);
    let storyboard = builder.build(&analysis(vec![s]));

    let audio = &storyboard.chapters[0].scenes[0].audio;
    assert_eq!(audio.len(), 1);
    assert_eq!(audio[0].kind, AudioKind::Narration);
    assert!(audio[0].speaker.is_none());
}

#[test]
fn empty_scene_becomes_silence_of_the_configured_length() {
    let options = JobOptions {
        silent_scene_duration: 2.5,
        ..JobOptions::default()
    };
    let builder = StoryboardBuilder::new(&options, PAUSE);
    let storyboard = builder.build(&analysis(vec![scene(1)]));

    let built = &storyboard.chapters[0].scenes[0];
    assert_eq!(built.audio.len(), 1);
    assert_eq!(built.audio[0].kind, AudioKind::Silence);
    assert_eq!(built.estimated_duration, 2.5);
}

#[test]
fn duration_follows_pacing_actions_and_clamps() {
    let options = JobOptions {
        chars_per_second: 10.0,
        action_seconds: 2.0,
        duration_min: 3.0,
        duration_max: 10.0,
        ..JobOptions::default()
    };
    let builder = StoryboardBuilder::new(&options, PAUSE);

    // 40 chars / 10 cps + 1 action * 2s = 6s.
    let mut s = scene(1);
    s.narration = "a".repeat(40);
    s.actions = vec!["opens the door".to_string()];
    let storyboard = builder.build(&analysis(vec![s]));
    let built = &storyboard.chapters[0].scenes[0];
    assert!((built.estimated_duration - 6.0).abs() < 1e-9);

    // A one-word line clamps up to duration_min.
    let mut short = scene(2);
    short.narration = "hi".to_string();
    let storyboard = builder.build(&analysis(vec![short]));
    assert_eq!(storyboard.chapters[0].scenes[0].estimated_duration, 3.0);

    // A wall of text clamps down to duration_max.
    let mut long = scene(3);
    long.narration = "a".repeat(5000);
    let storyboard = builder.build(&analysis(vec![long]));
    assert_eq!(storyboard.chapters[0].scenes[0].estimated_duration, 10.0);
}

#[test]
fn scene_appearance_overrides_overlay_the_global_record() {
    let mut s = dialogue_scene();
    s.character_appearances.insert(
        "Mara".to_string(),
        Appearance {
            clothing: "festival dress".to_string(),
            ..Appearance::default()
        },
    );
    let options = JobOptions::default();
    let builder = StoryboardBuilder::new(&options, PAUSE);
    let storyboard = builder.build(&analysis(vec![s]));

    let resolved = &storyboard.chapters[0].scenes[0].characters_resolved[0];
    assert_eq!(resolved.appearance.clothing, "festival dress", "override wins");
    assert_eq!(resolved.appearance.hair, "long red hair", "global survives");
    assert_eq!(resolved.personality, "curious");
}

#[test]
fn image_info_carries_scene_context_and_framing_defaults() {
    let options = JobOptions::default();
    let builder = StoryboardBuilder::new(&options, PAUSE);
    let storyboard = builder.build(&analysis(vec![scene(1)]));

    let info = &storyboard.chapters[0].scenes[0].image_info;
    assert!(info.prompt.contains("mist over the water"));
    assert!(info.prompt.contains("location: harbor"));
    assert!(info.prompt.contains("long red hair"));
    assert_eq!(info.shot_type, "medium_shot");
    assert_eq!(info.camera_angle, "eye_level");
    assert_eq!(info.transition, "cut");
    assert_eq!(info.lighting, "pale light");
}

#[test]
fn transform_is_deterministic() {
    let options = JobOptions::default();
    let builder = StoryboardBuilder::new(&options, PAUSE);
    let input = analysis(vec![dialogue_scene(), scene(2)]);
    assert_eq!(builder.build(&input), builder.build(&input));
}
