//! The static voice catalog.

use crate::{AgeStage, Gender};
use serde::{Deserialize, Serialize};

/// One entry of the voice catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoiceSpec {
    /// Provider voice identifier
    pub voice_id: String,
    /// Gender the voice is suited for
    pub gender: Gender,
    /// Age bucket the voice is suited for
    pub age_stage: AgeStage,
}

impl VoiceSpec {
    fn new(voice_id: &str, gender: Gender, age_stage: AgeStage) -> Self {
        Self {
            voice_id: voice_id.to_string(),
            gender,
            age_stage,
        }
    }
}

/// The built-in voice table, as shipped by the speech provider.
///
/// Entries span {male, female} x {child, youth, adult, elder}; jobs can
/// replace the table through `JobOptions::voice_catalog`.
pub fn builtin_catalog() -> Vec<VoiceSpec> {
    use AgeStage::{Adult, Child, Elder, Youth};
    use Gender::{Female, Male};

    vec![
        VoiceSpec::new("qiniu_zh_female_tmjxxy", Female, Youth),
        VoiceSpec::new("qiniu_zh_female_xyqxxj", Female, Youth),
        VoiceSpec::new("qiniu_zh_male_ljfdxz", Male, Youth),
        VoiceSpec::new("qiniu_zh_female_ljfdxx", Female, Youth),
        VoiceSpec::new("qiniu_zh_female_wwxkjx", Female, Adult),
        VoiceSpec::new("qiniu_zh_male_szxyxd", Male, Youth),
        VoiceSpec::new("qiniu_zh_female_glktss", Female, Adult),
        VoiceSpec::new("qiniu_zh_male_whxkxg", Male, Youth),
        VoiceSpec::new("qiniu_zh_male_wncwxz", Male, Youth),
        VoiceSpec::new("qiniu_zh_female_kljxdd", Female, Adult),
        VoiceSpec::new("qiniu_zh_male_ybxknjs", Male, Adult),
        VoiceSpec::new("qiniu_zh_male_hlsnkk", Male, Child),
        VoiceSpec::new("qiniu_zh_male_tyygjs", Male, Adult),
        VoiceSpec::new("qiniu_zh_female_zxjxnjs", Female, Adult),
        VoiceSpec::new("qiniu_zh_female_cxjxgw", Female, Elder),
        VoiceSpec::new("qiniu_zh_female_sqjyay", Female, Elder),
        VoiceSpec::new("qiniu_zh_female_dmytwz", Female, Child),
        VoiceSpec::new("qiniu_zh_female_segsby", Female, Child),
        VoiceSpec::new("qiniu_zh_male_qslymb", Male, Child),
        VoiceSpec::new("qiniu_zh_male_hllzmz", Male, Child),
        VoiceSpec::new("qiniu_zh_female_wwkjby", Female, Adult),
        VoiceSpec::new("qiniu_zh_male_etgsxe", Male, Child),
        VoiceSpec::new("qiniu_zh_male_gzjjxb", Male, Adult),
        VoiceSpec::new("qiniu_zh_male_cxkjns", Male, Adult),
        VoiceSpec::new("qiniu_zh_female_qwzscb", Female, Adult),
        VoiceSpec::new("qiniu_zh_male_mzjsxg", Male, Adult),
        VoiceSpec::new("qiniu_zh_female_yyqmpq", Female, Child),
        VoiceSpec::new("qiniu_zh_male_tcsnsf", Male, Child),
    ]
}
