//! Per-job speaker-to-voice assignment.

use fabula_core::{builtin_catalog, AgeStage, Appearance, Gender, JobOptions, VoiceSpec};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::debug;

/// Idempotent mapping from speaker name to a provider voice.
///
/// The catalog is fixed for the lifetime of a job. Once a speaker is
/// assigned, the mapping never changes within that job, regardless of how
/// scenes are ordered or re-rendered.
#[derive(Debug)]
pub struct VoiceRegistry {
    catalog: Vec<VoiceSpec>,
    narrator_voice: String,
    default_voice: String,
    assignments: HashMap<String, String>,
}

impl VoiceRegistry {
    /// Build the registry for one job.
    pub fn new(options: &JobOptions) -> Self {
        let catalog = options
            .voice_catalog
            .clone()
            .unwrap_or_else(builtin_catalog);
        Self {
            catalog,
            narrator_voice: options.narrator_voice.clone(),
            default_voice: options.default_voice.clone(),
            assignments: HashMap::new(),
        }
    }

    /// Voice used for narration units, independent of speaker mapping.
    pub fn voice_for_narration(&self) -> &str {
        &self.narrator_voice
    }

    /// The existing assignment for a speaker, if any.
    pub fn assignment(&self, speaker: &str) -> Option<&str> {
        self.assignments.get(speaker).map(String::as_str)
    }

    /// Assign a voice to a speaker; the first assignment wins.
    ///
    /// Candidates are catalog entries matching the character's gender and
    /// age stage; ties are broken by a stable hash of the speaker name so
    /// the same speaker gets the same voice on every run. With no exact
    /// match the gender alone is tried, then the configured default.
    pub fn assign(&mut self, speaker: &str, appearance: &Appearance) -> String {
        if let Some(existing) = self.assignments.get(speaker) {
            return existing.clone();
        }

        let gender = appearance.gender;
        let age_stage = appearance.effective_age_stage();
        let voice_id = self
            .pick(speaker, |v| v.gender == gender && v.age_stage == age_stage)
            .or_else(|| self.pick(speaker, |v| v.gender == gender))
            .unwrap_or_else(|| self.default_voice.clone());

        debug!(speaker, voice = %voice_id, ?gender, ?age_stage, "assigned voice");
        self.assignments
            .insert(speaker.to_string(), voice_id.clone());
        voice_id
    }

    fn pick<P>(&self, speaker: &str, predicate: P) -> Option<String>
    where
        P: Fn(&VoiceSpec) -> bool,
    {
        let candidates: Vec<&VoiceSpec> = self.catalog.iter().filter(|v| predicate(v)).collect();
        if candidates.is_empty() {
            return None;
        }
        let index = (stable_hash(speaker) % candidates.len() as u64) as usize;
        Some(candidates[index].voice_id.clone())
    }

    /// Number of assigned speakers, for progress messages.
    pub fn assigned_count(&self) -> usize {
        self.assignments.len()
    }
}

/// Stable across runs and platforms, unlike the std hasher.
fn stable_hash(input: &str) -> u64 {
    let digest = Sha256::digest(input.as_bytes());
    u64::from_be_bytes(digest[..8].try_into().expect("digest is 32 bytes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adult_female() -> Appearance {
        Appearance {
            gender: Gender::Female,
            age_stage: AgeStage::Adult,
            ..Appearance::default()
        }
    }

    #[test]
    fn assignment_is_idempotent() {
        let mut registry = VoiceRegistry::new(&JobOptions::default());
        let first = registry.assign("Mara", &adult_female());
        let second = registry.assign("Mara", &adult_female());
        assert_eq!(first, second);
    }

    #[test]
    fn first_assignment_wins_over_changed_appearance() {
        let mut registry = VoiceRegistry::new(&JobOptions::default());
        let first = registry.assign("Mara", &adult_female());
        let changed = Appearance {
            gender: Gender::Male,
            age_stage: AgeStage::Child,
            ..Appearance::default()
        };
        assert_eq!(registry.assign("Mara", &changed), first);
    }

    #[test]
    fn matches_gender_and_age_stage() {
        let mut registry = VoiceRegistry::new(&JobOptions::default());
        let voice = registry.assign("Old Wen", &Appearance {
            gender: Gender::Female,
            age: Some(72),
            ..Appearance::default()
        });
        let spec = builtin_catalog()
            .into_iter()
            .find(|v| v.voice_id == voice)
            .expect("assigned voice comes from the catalog");
        assert_eq!(spec.gender, Gender::Female);
        assert_eq!(spec.age_stage, AgeStage::Elder);
    }

    #[test]
    fn unknown_appearance_falls_back_to_default() {
        let options = JobOptions::default();
        let mut registry = VoiceRegistry::new(&options);
        let voice = registry.assign("???", &Appearance::default());
        assert_eq!(voice, options.default_voice);
    }

    #[test]
    fn numeric_age_overrides_reported_stage() {
        let mut registry = VoiceRegistry::new(&JobOptions::default());
        // Reported as adult but the text says nine years old.
        let voice = registry.assign("Niu", &Appearance {
            gender: Gender::Male,
            age: Some(9),
            age_stage: AgeStage::Adult,
            ..Appearance::default()
        });
        let spec = builtin_catalog()
            .into_iter()
            .find(|v| v.voice_id == voice)
            .unwrap();
        assert_eq!(spec.age_stage, AgeStage::Child);
    }
}
