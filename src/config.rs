use directories::UserDirs;
use log::info;
use serde::{Deserialize, Deserializer, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::{Error, Result};
use crate::gestures::Channel;
use crate::landmark::Finger;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Meta {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub timeout_ms: u64,
    pub max_match_distance: f32,
    /// Cost of matching any detection to an inactive track.
    pub inactive_cost: f32,
    /// Wrist / metacarpal confidence needed for an assignment signature.
    pub min_signature_confidence: f32,
    /// Joints below this are dropped before smoothing.
    pub min_landmark_confidence: f32,
    /// Route a lone detection through the thresholded best-track rule.
    pub gate_single_detection: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 800,
            max_match_distance: 0.30,
            inactive_cost: 0.05,
            min_signature_confidence: 0.10,
            min_landmark_confidence: 0.12,
            gate_single_detection: false,
        }
    }
}

impl TrackingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub min_gain: f32,
    pub max_gain: f32,
    pub confidence_gain: f32,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            min_gain: 0.08,
            max_gain: 0.28,
            confidence_gain: 0.30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    pub hold_confidence: f32,
    /// Max normalized move per frame for a repaired joint.
    pub clamp_max_step: f32,
    pub pip_fraction: f32,
    pub dip_fraction: f32,
    pub fingers: Vec<Finger>,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            hold_confidence: 0.22,
            clamp_max_step: 0.060,
            pip_fraction: 0.35,
            dip_fraction: 0.70,
            fingers: vec![Finger::Middle],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub channel: Channel,
    pub alpha: f32,
    /// Normalized pinch mapped to `max`.
    pub pinch_near: f32,
    /// Normalized pinch mapped to `min`.
    pub pinch_far: f32,
    pub min: f32,
    pub max: f32,
    pub initial: f32,
    /// Set to 1.0 to disable shaping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape_exponent: Option<f32>,
}

impl ChannelConfig {
    pub fn volume() -> Self {
        Self {
            channel: Channel::Volume,
            alpha: 0.24,
            pinch_near: 0.015,
            pinch_far: 0.095,
            min: 0.0,
            max: 1.0,
            initial: 0.5,
            shape_exponent: Some(0.65),
        }
    }

    pub fn tone() -> Self {
        Self {
            channel: Channel::Tone,
            alpha: 0.18,
            pinch_near: 0.015,
            pinch_far: 0.095,
            min: -24.0,
            max: 24.0,
            initial: 0.0,
            shape_exponent: None,
        }
    }
}

fn default_left() -> ChannelConfig {
    ChannelConfig::volume()
}

fn default_right() -> ChannelConfig {
    ChannelConfig::tone()
}

// A channel section in a profile; unset keys keep the role's defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChannelOverrides {
    channel: Option<Channel>,
    alpha: Option<f32>,
    pinch_near: Option<f32>,
    pinch_far: Option<f32>,
    min: Option<f32>,
    max: Option<f32>,
    initial: Option<f32>,
    shape_exponent: Option<f32>,
}

impl ChannelOverrides {
    fn apply(self, base: ChannelConfig) -> ChannelConfig {
        ChannelConfig {
            channel: self.channel.unwrap_or(base.channel),
            alpha: self.alpha.unwrap_or(base.alpha),
            pinch_near: self.pinch_near.unwrap_or(base.pinch_near),
            pinch_far: self.pinch_far.unwrap_or(base.pinch_far),
            min: self.min.unwrap_or(base.min),
            max: self.max.unwrap_or(base.max),
            initial: self.initial.unwrap_or(base.initial),
            shape_exponent: self.shape_exponent.or(base.shape_exponent),
        }
    }
}

fn left_channel<'de, D>(d: D) -> std::result::Result<ChannelConfig, D::Error>
where
    D: Deserializer<'de>,
{
    ChannelOverrides::deserialize(d).map(|o| o.apply(default_left()))
}

fn right_channel<'de, D>(d: D) -> std::result::Result<ChannelConfig, D::Error>
where
    D: Deserializer<'de>,
{
    ChannelOverrides::deserialize(d).map(|o| o.apply(default_right()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GestureConfig {
    #[serde(default = "default_pinch_on")]
    pub pinch_on: f32,
    #[serde(default = "default_pinch_off")]
    pub pinch_off: f32,
    #[serde(default = "default_left", deserialize_with = "left_channel")]
    pub left: ChannelConfig,
    #[serde(default = "default_right", deserialize_with = "right_channel")]
    pub right: ChannelConfig,
}

fn default_pinch_on() -> f32 {
    0.070
}

fn default_pinch_off() -> f32 {
    0.095
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            pinch_on: default_pinch_on(),
            pinch_off: default_pinch_off(),
            left: default_left(),
            right: default_right(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub meta: Meta,
    pub tracking: TrackingConfig,
    pub smoothing: SmoothingConfig,
    pub stabilizer: StabilizerConfig,
    pub gestures: GestureConfig,
}

impl Profile {
    pub fn from_toml_str(txt: &str) -> Result<Self> {
        let profile: Profile = toml::from_str(txt)?;
        validate_profile(&profile)?;
        Ok(profile)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let txt = fs::read_to_string(path)?;
        Self::from_toml_str(&txt)
    }
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidProfile(msg.into())
}

fn in_unit(v: f32) -> bool {
    (0.0..=1.0).contains(&v)
}

pub fn validate_profile(p: &Profile) -> Result<()> {
    // Comparisons are written so that NaN fails them.
    let t = &p.tracking;
    if t.timeout_ms == 0 {
        return Err(invalid("tracking.timeout_ms must be positive"));
    }
    if !(t.max_match_distance > 0.0 && t.max_match_distance.is_finite()) {
        return Err(invalid("tracking.max_match_distance must be positive"));
    }
    if !(t.inactive_cost >= 0.0 && t.inactive_cost.is_finite()) {
        return Err(invalid("tracking.inactive_cost must be non-negative"));
    }
    if !in_unit(t.min_signature_confidence) || !in_unit(t.min_landmark_confidence) {
        return Err(invalid("tracking confidence thresholds must be in [0,1]"));
    }

    let s = &p.smoothing;
    if !(s.min_gain > 0.0 && s.min_gain <= s.max_gain && s.max_gain <= 1.0) {
        return Err(invalid(
            "smoothing gains must satisfy 0 < min_gain <= max_gain <= 1",
        ));
    }
    if !(s.confidence_gain >= 0.0 && s.confidence_gain.is_finite()) {
        return Err(invalid("smoothing.confidence_gain must be non-negative"));
    }

    let st = &p.stabilizer;
    if !in_unit(st.hold_confidence) {
        return Err(invalid("stabilizer.hold_confidence must be in [0,1]"));
    }
    if !(st.clamp_max_step > 0.0 && st.clamp_max_step.is_finite()) {
        return Err(invalid("stabilizer.clamp_max_step must be positive"));
    }
    if !in_unit(st.pip_fraction) || !in_unit(st.dip_fraction) {
        return Err(invalid("stabilizer fractions must be in [0,1]"));
    }

    let g = &p.gestures;
    if !(g.pinch_on > 0.0 && g.pinch_on < g.pinch_off && g.pinch_off.is_finite()) {
        return Err(invalid("gestures: need 0 < pinch_on < pinch_off"));
    }
    for (role, c) in [("left", &g.left), ("right", &g.right)] {
        if !(c.alpha > 0.0 && c.alpha <= 1.0) {
            return Err(invalid(format!("gestures.{role}.alpha must be in (0,1]")));
        }
        if !(c.pinch_near < c.pinch_far && c.pinch_near.is_finite() && c.pinch_far.is_finite()) {
            return Err(invalid(format!(
                "gestures.{role}: pinch_near must be below pinch_far"
            )));
        }
        if !(c.min <= c.max && c.min.is_finite() && c.max.is_finite()) {
            return Err(invalid(format!("gestures.{role}: min must not exceed max")));
        }
        if !c.initial.is_finite() {
            return Err(invalid(format!("gestures.{role}.initial must be finite")));
        }
        if let Some(e) = c.shape_exponent {
            if !(e > 0.0 && e.is_finite()) {
                return Err(invalid(format!(
                    "gestures.{role}.shape_exponent must be positive"
                )));
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ProfileStore {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

pub fn config_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or(Error::NoHomeDir)?;
    Ok(dirs.home_dir().join(".config").join("handctl"))
}

pub fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl ProfileStore {
    pub fn load_or_install_default() -> Result<Self> {
        Self::open(config_dir()?)
    }

    /// Opens (and seeds, if empty) a profile store rooted at `cfgdir`.
    pub fn open(cfgdir: PathBuf) -> Result<Self> {
        let profdir = cfgdir.join("profiles");
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = cfgdir.join("active");
        if !active_ptr.exists() {
            fs::write(&active_ptr, b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = load_profile(&profdir, &active_name)?;

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    pub fn reload(&mut self) -> Result<()> {
        self.profile = load_profile(&self.profiles_dir, &self.active_name)?;
        Ok(())
    }

    /// Loads a profile by name without touching the active pointer.
    pub fn load_named(&self, name: &str) -> Result<Profile> {
        load_profile(&self.profiles_dir, name)
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let profile = self.load_named(name)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.profile = profile;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                let path = e.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        v.push(stem.to_string());
                    }
                }
            }
        }
        v.sort();
        v
    }

    pub fn status_report(&self) -> serde_json::Value {
        serde_json::json!({
            "config_dir": self.config_dir,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "profiles": self.list_profiles(),
        })
    }
}

fn load_profile(profdir: &Path, name: &str) -> Result<Profile> {
    let path = profdir.join(format!("{name}.toml"));
    if !path.exists() {
        return Err(Error::ProfileNotFound(path));
    }
    Profile::from_file(&path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("handctl-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn empty_document_is_default_profile() {
        let p = Profile::from_toml_str("").unwrap();
        assert_eq!(p.tracking.timeout_ms, 800);
        assert_eq!(p.stabilizer.fingers, vec![Finger::Middle]);
        assert_eq!(p.gestures.left.channel, Channel::Volume);
        assert_eq!(p.gestures.right.channel, Channel::Tone);
    }

    #[test]
    fn bundled_default_matches_builtin_defaults() {
        let p = Profile::from_toml_str(default_profile_text()).unwrap();
        let d = Profile::default();
        assert_eq!(p.tracking.max_match_distance, d.tracking.max_match_distance);
        assert_eq!(p.smoothing.max_gain, d.smoothing.max_gain);
        assert_eq!(p.stabilizer.hold_confidence, d.stabilizer.hold_confidence);
        assert_eq!(p.gestures.pinch_on, d.gestures.pinch_on);
        assert_eq!(p.gestures.pinch_off, d.gestures.pinch_off);
        assert_eq!(p.gestures.left.alpha, 0.24);
        assert_eq!(p.gestures.right.alpha, 0.18);
        assert_eq!(p.gestures.left.shape_exponent, Some(0.65));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let p = Profile::from_toml_str(
            r#"
            [tracking]
            timeout_ms = 500

            [gestures]
            pinch_on = 0.05
            "#,
        )
        .unwrap();
        assert_eq!(p.tracking.timeout(), Duration::from_millis(500));
        assert_eq!(p.tracking.max_match_distance, 0.30);
        assert_eq!(p.gestures.pinch_on, 0.05);
        assert_eq!(p.gestures.pinch_off, 0.095);
    }

    #[test]
    fn inverted_hysteresis_band_is_rejected() {
        let err = Profile::from_toml_str(
            r#"
            [gestures]
            pinch_on = 0.10
            pinch_off = 0.08
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidProfile(_)));
    }

    #[test]
    fn inverted_gains_are_rejected() {
        let err = Profile::from_toml_str(
            r#"
            [smoothing]
            min_gain = 0.5
            max_gain = 0.2
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidProfile(_)));
    }

    #[test]
    fn partial_channel_section_keeps_role_defaults() {
        let p = Profile::from_toml_str(
            r#"
            [gestures.left]
            alpha = 0.3

            [gestures.right]
            max = 12.0
            "#,
        )
        .unwrap();
        let (l, r) = (&p.gestures.left, &p.gestures.right);
        assert_eq!(l.alpha, 0.3);
        assert_eq!(l.channel, Channel::Volume);
        assert_eq!(l.shape_exponent, Some(0.65));
        assert_eq!(l.initial, 0.5);
        assert_eq!(r.channel, Channel::Tone);
        assert_eq!(r.max, 12.0);
        assert_eq!(r.min, -24.0);
        assert_eq!(r.alpha, 0.18);
        assert_eq!(r.shape_exponent, None);
    }

    #[test]
    fn nan_thresholds_are_rejected() {
        for doc in [
            "[tracking]\nmax_match_distance = nan\n",
            "[tracking]\ninactive_cost = nan\n",
            "[smoothing]\nconfidence_gain = nan\n",
            "[stabilizer]\nclamp_max_step = nan\n",
            "[gestures.left]\npinch_near = nan\n",
            "[gestures.right]\npinch_far = nan\n",
            "[gestures.right]\nmin = nan\n",
            "[stabilizer]\nclamp_max_step = inf\n",
        ] {
            let err = Profile::from_toml_str(doc).unwrap_err();
            assert!(matches!(err, Error::InvalidProfile(_)), "{doc:?} accepted");
        }
    }

    #[test]
    fn load_named_leaves_active_pointer_alone() {
        let dir = scratch_dir("named");
        let store = ProfileStore::open(dir.clone()).unwrap();
        fs::write(
            store.profiles_dir.join("stage.toml"),
            "[tracking]\ntimeout_ms = 400\n",
        )
        .unwrap();

        let p = store.load_named("stage").unwrap();
        assert_eq!(p.tracking.timeout_ms, 400);
        assert_eq!(fs::read_to_string(&store.active_ptr).unwrap(), "default");
        assert_eq!(store.active_name, "default");
        assert!(matches!(
            store.load_named("missing"),
            Err(Error::ProfileNotFound(_))
        ));

        let reopened = ProfileStore::open(dir.clone()).unwrap();
        assert_eq!(reopened.active_name, "default");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn store_installs_default_and_switches_profiles() {
        let dir = scratch_dir("store");
        let mut store = ProfileStore::open(dir.clone()).unwrap();
        assert_eq!(store.active_name, "default");
        assert_eq!(store.list_profiles(), vec!["default".to_string()]);

        fs::write(
            store.profiles_dir.join("stage.toml"),
            "[tracking]\ntimeout_ms = 400\n",
        )
        .unwrap();
        store.set_active("stage").unwrap();
        assert_eq!(store.profile.tracking.timeout_ms, 400);
        assert_eq!(fs::read_to_string(&store.active_ptr).unwrap(), "stage");

        assert!(matches!(
            store.set_active("missing"),
            Err(Error::ProfileNotFound(_))
        ));
        assert_eq!(store.active_name, "stage");

        let _ = fs::remove_dir_all(&dir);
    }
}
