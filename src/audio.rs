//! Sound effect interface
//!
//! Audio output is a backend trait; the game ships with a silent backend
//! that only logs. `AudioManager` turns game events into effect requests and
//! applies the volume settings.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::settings::Settings;
use crate::sim::GameEvent;

/// Handle to a loaded sound buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SoundId(pub u32);

/// Handle to a playing voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId(pub u32);

/// Sound effect types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundEffect {
    /// A new object appears
    Spawn,
    /// An object settles on the floor
    Land,
    /// The player is hit
    GameOver,
    /// Round restarted
    Restart,
}

impl SoundEffect {
    pub const ALL: [SoundEffect; 4] = [
        SoundEffect::Spawn,
        SoundEffect::Land,
        SoundEffect::GameOver,
        SoundEffect::Restart,
    ];

    /// WAV file expected under the sound directory
    pub fn file_name(&self) -> &'static str {
        match self {
            SoundEffect::Spawn => "spawn.wav",
            SoundEffect::Land => "land.wav",
            SoundEffect::GameOver => "game_over.wav",
            SoundEffect::Restart => "restart.wav",
        }
    }
}

/// A sound output device
pub trait AudioBackend {
    /// Open the device; `false` leaves audio disabled
    fn init(&mut self) -> bool;
    fn shutdown(&mut self);
    fn load_wav(&mut self, path: &Path) -> Option<SoundId>;
    fn play(&mut self, sound: SoundId, volume: f32, looping: bool) -> Option<VoiceId>;
    fn stop(&mut self, voice: VoiceId);
}

/// Backend that accepts every call and produces no sound
#[derive(Debug, Default)]
pub struct NullAudio {
    next_id: u32,
}

impl NullAudio {
    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl AudioBackend for NullAudio {
    fn init(&mut self) -> bool {
        log::debug!("audio: null backend");
        true
    }

    fn shutdown(&mut self) {
        log::debug!("audio: shutdown");
    }

    fn load_wav(&mut self, path: &Path) -> Option<SoundId> {
        let id = SoundId(self.next());
        log::debug!("audio: load {} as {:?}", path.display(), id);
        Some(id)
    }

    fn play(&mut self, sound: SoundId, volume: f32, looping: bool) -> Option<VoiceId> {
        let voice = VoiceId(self.next());
        log::debug!("audio: play {:?} at {:.2} (loop: {}) on {:?}", sound, volume, looping, voice);
        Some(voice)
    }

    fn stop(&mut self, voice: VoiceId) {
        log::debug!("audio: stop {:?}", voice);
    }
}

/// Audio manager for the game
pub struct AudioManager {
    backend: Box<dyn AudioBackend>,
    enabled: bool,
    sounds: HashMap<SoundEffect, SoundId>,
    master_volume: f32,
    sfx_volume: f32,
    muted: bool,
    /// Game-over sting still playing, cut off on restart
    game_over_voice: Option<VoiceId>,
}

impl Default for AudioManager {
    fn default() -> Self {
        Self::new(Box::new(NullAudio::default()))
    }
}

impl AudioManager {
    pub fn new(mut backend: Box<dyn AudioBackend>) -> Self {
        let enabled = backend.init();
        if !enabled {
            log::warn!("Audio device unavailable - audio disabled");
        }
        Self {
            backend,
            enabled,
            sounds: HashMap::new(),
            master_volume: 0.8,
            sfx_volume: 1.0,
            muted: false,
            game_over_voice: None,
        }
    }

    /// Load every effect from `dir`; missing files just stay silent
    pub fn load_effects(&mut self, dir: &Path) {
        if !self.enabled {
            return;
        }
        for effect in SoundEffect::ALL {
            let path: PathBuf = dir.join(effect.file_name());
            match self.backend.load_wav(&path) {
                Some(id) => {
                    self.sounds.insert(effect, id);
                }
                None => log::warn!("Sound {} not loaded", path.display()),
            }
        }
    }

    pub fn apply_settings(&mut self, settings: &Settings) {
        self.set_master_volume(settings.master_volume);
        self.set_sfx_volume(settings.sfx_volume);
        self.set_muted(settings.muted);
    }

    /// Set master volume (0.0 - 1.0)
    pub fn set_master_volume(&mut self, vol: f32) {
        self.master_volume = vol.clamp(0.0, 1.0);
    }

    /// Set SFX volume (0.0 - 1.0)
    pub fn set_sfx_volume(&mut self, vol: f32) {
        self.sfx_volume = vol.clamp(0.0, 1.0);
    }

    /// Mute/unmute all audio
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.master_volume * self.sfx_volume
        }
    }

    /// Play a sound effect
    pub fn play(&mut self, effect: SoundEffect) -> Option<VoiceId> {
        let vol = self.effective_volume();
        if !self.enabled || vol <= 0.0 {
            return None;
        }
        let sound = *self.sounds.get(&effect)?;
        self.backend.play(sound, vol, false)
    }

    pub fn stop(&mut self, voice: VoiceId) {
        if self.enabled {
            self.backend.stop(voice);
        }
    }

    /// New round: silence the game-over sting, then play the restart cue
    pub fn restart(&mut self) {
        if let Some(voice) = self.game_over_voice.take() {
            self.stop(voice);
        }
        self.play(SoundEffect::Restart);
    }

    /// Play the effects for one tick's events
    pub fn handle_events(&mut self, events: &[GameEvent]) {
        for event in events {
            let effect = match event {
                GameEvent::Spawned => SoundEffect::Spawn,
                GameEvent::Landed(_) => SoundEffect::Land,
                GameEvent::Lost(_) => continue,
                GameEvent::PlayerDied => SoundEffect::GameOver,
            };
            let voice = self.play(effect);
            if effect == SoundEffect::GameOver {
                self.game_over_voice = voice;
            }
        }
    }
}

impl Drop for AudioManager {
    fn drop(&mut self) {
        if self.enabled {
            self.backend.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log {
        played: Vec<(SoundId, f32)>,
        stopped: Vec<VoiceId>,
        shut_down: bool,
    }

    struct Recording {
        log: Rc<RefCell<Log>>,
        available: bool,
        skip_restart: bool,
        next: u32,
    }

    impl AudioBackend for Recording {
        fn init(&mut self) -> bool {
            self.available
        }
        fn shutdown(&mut self) {
            self.log.borrow_mut().shut_down = true;
        }
        fn load_wav(&mut self, path: &Path) -> Option<SoundId> {
            if path.ends_with("restart.wav") && self.skip_restart {
                return None;
            }
            self.next += 1;
            Some(SoundId(self.next))
        }
        fn play(&mut self, sound: SoundId, volume: f32, _looping: bool) -> Option<VoiceId> {
            self.log.borrow_mut().played.push((sound, volume));
            Some(VoiceId(sound.0))
        }
        fn stop(&mut self, voice: VoiceId) {
            self.log.borrow_mut().stopped.push(voice);
        }
    }

    fn manager(available: bool) -> (AudioManager, Rc<RefCell<Log>>) {
        recording_manager(available, true)
    }

    fn recording_manager(available: bool, skip_restart: bool) -> (AudioManager, Rc<RefCell<Log>>) {
        let log = Rc::new(RefCell::new(Log::default()));
        let backend = Recording {
            log: Rc::clone(&log),
            available,
            skip_restart,
            next: 0,
        };
        let mut audio = AudioManager::new(Box::new(backend));
        audio.load_effects(Path::new("sounds"));
        (audio, log)
    }

    #[test]
    fn test_events_map_to_effects() {
        let (mut audio, log) = manager(true);
        audio.handle_events(&[
            GameEvent::Spawned,
            GameEvent::Lost(1),
            GameEvent::Landed(2),
            GameEvent::PlayerDied,
        ]);
        let played: Vec<u32> = log.borrow().played.iter().map(|(id, _)| id.0).collect();
        // Load order: spawn=1, land=2, game_over=3
        assert_eq!(played, vec![1, 2, 3]);
    }

    #[test]
    fn test_volume_and_mute() {
        let (mut audio, log) = manager(true);
        audio.set_master_volume(0.5);
        audio.set_sfx_volume(2.0);
        audio.play(SoundEffect::Spawn);
        assert_eq!(log.borrow().played[0].1, 0.5);

        audio.set_muted(true);
        assert!(audio.play(SoundEffect::Spawn).is_none());
        assert_eq!(log.borrow().played.len(), 1);
    }

    #[test]
    fn test_unloaded_effect_is_silent() {
        let (mut audio, log) = manager(true);
        assert!(audio.play(SoundEffect::Restart).is_none());
        assert!(log.borrow().played.is_empty());
    }

    #[test]
    fn test_unavailable_device_disables_audio() {
        let (mut audio, log) = manager(false);
        assert!(audio.play(SoundEffect::Spawn).is_none());
        drop(audio);
        assert!(!log.borrow().shut_down);
    }

    #[test]
    fn test_restart_stops_game_over_sting() {
        let (mut audio, log) = recording_manager(true, false);
        audio.handle_events(&[GameEvent::PlayerDied]);
        audio.restart();

        // Load order: spawn=1, land=2, game_over=3, restart=4; voices mirror sounds
        assert_eq!(log.borrow().stopped, vec![VoiceId(3)]);
        let played: Vec<u32> = log.borrow().played.iter().map(|(id, _)| id.0).collect();
        assert_eq!(played, vec![3, 4]);

        // The sting is only stopped once
        audio.restart();
        assert_eq!(log.borrow().stopped.len(), 1);
    }

    #[test]
    fn test_shutdown_on_drop() {
        let (audio, log) = manager(true);
        drop(audio);
        assert!(log.borrow().shut_down);
    }

    #[test]
    fn test_null_backend_accepts_everything() {
        let mut audio = AudioManager::default();
        audio.load_effects(Path::new("sounds"));
        assert!(audio.play(SoundEffect::Land).is_some());
    }
}
