use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::info;
use serde::Deserialize;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
}

/// Tunable counting/association parameters. All of these are calibration
/// knobs, never hard-coded in the engine.
#[derive(Debug, Clone, Deserialize)]
pub struct Thresholds {
    /// Arm qualifying band in degrees: both arms count as "raised" when
    /// the hip-shoulder-wrist angle falls strictly inside (low, high).
    pub arm_up_low: f32,
    pub arm_up_high: f32,
    /// Leg qualifying band in degrees over the cross-body diagonal
    /// (opposite shoulder - hip - ankle), which straightens toward 180
    /// as the leg abducts.
    pub leg_apart_low: f32,
    pub leg_apart_high: f32,
    /// Association gate in normalized units; a detection farther than this
    /// from every live track spawns a new identity.
    pub max_match_distance: f32,
    /// Consecutive unseen frames before a track is retired.
    pub max_missed_frames: u32,
    /// Majority-vote debounce window in frames; 0 or 1 disables smoothing.
    #[serde(default)]
    pub smoothing_window: u32,
    /// Landmarks below this confidence are treated as absent.
    #[serde(default = "default_min_visibility")]
    pub min_visibility: f32,
}

fn default_min_visibility() -> f32 {
    0.5
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            arm_up_low: 160.0,
            arm_up_high: 200.0,
            leg_apart_low: 160.0,
            leg_apart_high: 200.0,
            max_match_distance: 0.25,
            max_missed_frames: 30,
            smoothing_window: 0,
            min_visibility: default_min_visibility(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} = {value} is outside the valid [0, 360) degree range")]
    AngleOutOfRange { field: &'static str, value: f32 },
    #[error("{low_field} ({low}) must be strictly below {high_field} ({high})")]
    InvertedBand {
        low_field: &'static str,
        low: f32,
        high_field: &'static str,
        high: f32,
    },
    #[error("max_match_distance must be positive, got {0}")]
    NonPositiveDistance(f32),
    #[error("min_visibility must be within [0, 1], got {0}")]
    VisibilityOutOfRange(f32),
}

impl Thresholds {
    /// Fail-fast validation; a profile that does not pass never reaches
    /// the engine.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let angles = [
            ("arm_up_low", self.arm_up_low),
            ("arm_up_high", self.arm_up_high),
            ("leg_apart_low", self.leg_apart_low),
            ("leg_apart_high", self.leg_apart_high),
        ];
        for (field, value) in angles {
            if !(0.0..360.0).contains(&value) {
                return Err(ConfigError::AngleOutOfRange { field, value });
            }
        }
        if self.arm_up_low >= self.arm_up_high {
            return Err(ConfigError::InvertedBand {
                low_field: "arm_up_low",
                low: self.arm_up_low,
                high_field: "arm_up_high",
                high: self.arm_up_high,
            });
        }
        if self.leg_apart_low >= self.leg_apart_high {
            return Err(ConfigError::InvertedBand {
                low_field: "leg_apart_low",
                low: self.leg_apart_low,
                high_field: "leg_apart_high",
                high: self.leg_apart_high,
            });
        }
        if self.max_match_distance <= 0.0 {
            return Err(ConfigError::NonPositiveDistance(self.max_match_distance));
        }
        if !(0.0..=1.0).contains(&self.min_visibility) {
            return Err(ConfigError::VisibilityOutOfRange(self.min_visibility));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub meta: Meta,
    pub thresholds: Thresholds,
}

#[derive(Debug, Clone)]
pub struct DaemonConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

fn config_dir() -> PathBuf {
    let home = UserDirs::new().unwrap().home_dir().to_path_buf();
    home.join(".config").join("jackcount")
}

fn profiles_dir() -> PathBuf {
    config_dir().join("profiles")
}

fn active_ptr_path() -> PathBuf {
    config_dir().join("active")
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl DaemonConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        let cfgdir = config_dir();
        let profdir = profiles_dir();
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = active_ptr_path();
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = Self::load_profile(&profdir, &active_name)?;

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    pub fn reload(&mut self) -> Result<()> {
        self.profile = Self::load_profile(&self.profiles_dir, &self.active_name)?;
        Ok(())
    }

    /// Switch the active profile. Validation happens before anything is
    /// written, so a bad profile leaves both the pointer file and the
    /// in-memory state untouched.
    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let profile = Self::load_profile(&self.profiles_dir, name)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.profile = profile;
        Ok(())
    }

    /// Parse and validate a profile without touching any state. Used to
    /// reject a bad `reload`/`use` in the client's reply.
    pub fn check_profile(&self, name: &str) -> Result<()> {
        Self::load_profile(&self.profiles_dir, name).map(|_| ())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                if let Some(ext) = e.path().extension() {
                    if ext == "toml" {
                        if let Some(stem) = e.path().file_stem().and_then(|s| s.to_str()) {
                            v.push(stem.to_string());
                        }
                    }
                }
            }
        }
        v.sort();
        v
    }

    fn load_profile(dir: &Path, name: &str) -> Result<Profile> {
        let path = dir.join(format!("{name}.toml"));
        let txt = fs::read_to_string(&path)
            .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
        parse_profile(&txt).map_err(|e| anyhow!("invalid profile {}: {e}", path.display()))
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let control_sock = crate::ipc::runtime::socket_path();
        let frames_sock = crate::ipc::runtime::frames_socket_path();
        serde_json::json!({
            "config_dir": self.config_dir,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "control_socket": control_sock,
            "control_socket_present": Path::new(&control_sock).exists(),
            "frames_socket": frames_sock,
            "frames_socket_present": Path::new(&frames_sock).exists(),
            "hints": {
                "start_daemon": "jackcount start",
                "frame_format": "one JSON object per line: {\"detections\": [{\"landmarks\": [{\"id\", \"x\", \"y\", \"visibility\"}]}]}"
            }
        })
    }
}

fn parse_profile(txt: &str) -> Result<Profile> {
    let profile: Profile = toml::from_str(txt)?;
    profile.thresholds.validate()?;
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds_validate() {
        assert!(Thresholds::default().validate().is_ok());
    }

    #[test]
    fn test_embedded_default_profile_parses() {
        let p = parse_profile(default_profile_text()).unwrap();
        assert_eq!(p.meta.name.as_deref(), Some("default"));
    }

    #[test]
    fn test_angle_out_of_range_rejected() {
        let th = Thresholds {
            arm_up_high: 360.0,
            ..Thresholds::default()
        };
        assert!(matches!(
            th.validate(),
            Err(ConfigError::AngleOutOfRange {
                field: "arm_up_high",
                ..
            })
        ));
    }

    #[test]
    fn test_inverted_band_rejected() {
        let th = Thresholds {
            leg_apart_low: 210.0,
            leg_apart_high: 200.0,
            ..Thresholds::default()
        };
        assert!(matches!(th.validate(), Err(ConfigError::InvertedBand { .. })));
    }

    #[test]
    fn test_negative_distance_rejected() {
        let th = Thresholds {
            max_match_distance: -1.0,
            ..Thresholds::default()
        };
        assert!(matches!(
            th.validate(),
            Err(ConfigError::NonPositiveDistance(_))
        ));
    }

    #[test]
    fn test_profile_without_thresholds_fails() {
        assert!(parse_profile("[meta]\nname = \"x\"\n").is_err());
    }

    fn state_with_dir(dir: &Path) -> DaemonConfigState {
        DaemonConfigState {
            active_name: "default".to_string(),
            profile: Profile {
                meta: Meta::default(),
                thresholds: Thresholds::default(),
            },
            config_dir: dir.to_path_buf(),
            profiles_dir: dir.to_path_buf(),
            active_ptr: dir.join("active"),
        }
    }

    #[test]
    fn test_rejected_profile_switch_keeps_previous() {
        let dir = std::env::temp_dir().join("jackcount-config-test");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("bad.toml"),
            "[thresholds]\n\
             arm_up_low = 200.0\narm_up_high = 160.0\n\
             leg_apart_low = 160.0\nleg_apart_high = 200.0\n\
             max_match_distance = 0.25\nmax_missed_frames = 30\n",
        )
        .unwrap();

        let mut st = state_with_dir(&dir);
        assert!(st.check_profile("bad").is_err());
        assert!(st.set_active("bad").is_err());
        // the failed switch left everything as it was
        assert_eq!(st.active_name, "default");
        assert_eq!(st.profile.thresholds.arm_up_low, 160.0);
        assert!(!st.active_ptr.exists());
    }

    #[test]
    fn test_switch_to_missing_profile_fails() {
        let dir = std::env::temp_dir().join("jackcount-config-test-missing");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();

        let mut st = state_with_dir(&dir);
        assert!(st.check_profile("nope").is_err());
        assert!(st.set_active("nope").is_err());
        assert_eq!(st.active_name, "default");
    }
}
