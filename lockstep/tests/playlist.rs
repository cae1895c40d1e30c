// A playlist model checked against two player implementations.
use lockstep::*;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
struct PlayerModel {
    playing: bool,
    num_tracks: usize,
    seen: BTreeSet<String>,
}

impl PlayerModel {
    fn new(tracks: &BTreeSet<String>) -> Self {
        PlayerModel {
            playing: false,
            num_tracks: tracks.len(),
            seen: tracks.clone(),
        }
    }
}

/// Between one and ten distinct starting tracks.
fn initial_tracks() -> Gen<BTreeSet<String>> {
    Gen::<BTreeSet<String>>::set_of(Gen::<String>::hex_string(1, 10), 1, 10)
}

trait Player {
    fn play(&mut self);
    fn pause(&mut self);
    fn next(&mut self);
    fn add_track(&mut self, name: &str, position: usize);
    fn is_playing(&self) -> bool;
    fn current_track(&self) -> &str;
}

/// Tracks in a vector with the index of the current one.
struct IndexPlayer {
    tracks: Vec<String>,
    current: usize,
    playing: bool,
    /// When false, inserting before the cursor silently changes the current track.
    shift_on_insert: bool,
}

impl IndexPlayer {
    fn correct(tracks: Vec<String>) -> Self {
        Self::with_shift(tracks, true)
    }

    fn forgetful(tracks: Vec<String>) -> Self {
        Self::with_shift(tracks, false)
    }

    fn with_shift(tracks: Vec<String>, shift_on_insert: bool) -> Self {
        IndexPlayer {
            tracks,
            current: 0,
            playing: false,
            shift_on_insert,
        }
    }
}

impl Player for IndexPlayer {
    fn play(&mut self) {
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn next(&mut self) {
        self.current = (self.current + 1) % self.tracks.len();
    }

    fn add_track(&mut self, name: &str, position: usize) {
        self.tracks.insert(position, name.to_string());
        if self.shift_on_insert && position <= self.current {
            self.current += 1;
        }
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn current_track(&self) -> &str {
        &self.tracks[self.current]
    }
}

/// Tracks in a vector, remembering the current one by name.
struct NamePlayer {
    tracks: Vec<String>,
    current: String,
    playing: bool,
}

impl NamePlayer {
    fn new(tracks: Vec<String>) -> Self {
        NamePlayer {
            current: tracks[0].clone(),
            tracks,
            playing: false,
        }
    }
}

impl Player for NamePlayer {
    fn play(&mut self) {
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn next(&mut self) {
        let index = self
            .tracks
            .iter()
            .position(|track| *track == self.current)
            .unwrap_or(0);
        self.current = self.tracks[(index + 1) % self.tracks.len()].clone();
    }

    fn add_track(&mut self, name: &str, position: usize) {
        self.tracks.insert(position, name.to_string());
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn current_track(&self) -> &str {
        &self.current
    }
}

#[derive(Debug, Clone)]
struct Play;

#[derive(Debug, Clone)]
struct Pause;

#[derive(Debug, Clone)]
struct Next;

#[derive(Debug, Clone)]
struct AddTrack {
    position: usize,
    name: String,
}

impl<P: Player> Command<PlayerModel, P> for Play {
    fn apply(&self, model: &mut PlayerModel) {
        model.playing = true;
    }

    fn run(&self, _model: &PlayerModel, real: &mut P) -> Result<(), Failure> {
        real.play();
        ensure!(real.is_playing(), "player is paused after play");
        Ok(())
    }

    fn describe(&self) -> String {
        "Play".to_string()
    }
}

impl<P: Player> Command<PlayerModel, P> for Pause {
    fn apply(&self, model: &mut PlayerModel) {
        model.playing = false;
    }

    fn run(&self, _model: &PlayerModel, real: &mut P) -> Result<(), Failure> {
        real.pause();
        ensure!(!real.is_playing(), "player is playing after pause");
        Ok(())
    }

    fn describe(&self) -> String {
        "Pause".to_string()
    }
}

impl<P: Player> Command<PlayerModel, P> for Next {
    fn apply(&self, _model: &mut PlayerModel) {}

    fn run(&self, model: &PlayerModel, real: &mut P) -> Result<(), Failure> {
        let before = real.current_track().to_string();
        real.next();
        if model.num_tracks == 1 {
            ensure_eq!(real.current_track(), before.as_str());
        } else {
            ensure!(
                real.current_track() != before,
                "next stayed on {:?} with {} tracks",
                before,
                model.num_tracks
            );
        }
        ensure_eq!(real.is_playing(), model.playing);
        Ok(())
    }

    fn describe(&self) -> String {
        "Next".to_string()
    }
}

impl<P: Player> Command<PlayerModel, P> for AddTrack {
    fn check(&self, model: &PlayerModel) -> bool {
        !model.seen.contains(&self.name)
    }

    fn apply(&self, model: &mut PlayerModel) {
        model.num_tracks += 1;
        model.seen.insert(self.name.clone());
    }

    fn run(&self, model: &PlayerModel, real: &mut P) -> Result<(), Failure> {
        let before = real.current_track().to_string();
        real.add_track(&self.name, self.position % (model.num_tracks + 1));
        ensure_eq!(real.is_playing(), model.playing);
        ensure_eq!(real.current_track(), before.as_str(), "current track changed");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("AddTrack({}, {:?})", self.position, self.name)
    }
}

fn player_machine<P: Player + 'static>(
    make: fn(Vec<String>) -> P,
    names: Gen<String>,
) -> StateMachine<PlayerModel, P> {
    let add_track = Gen::<usize>::int_range(0, 20)
        .zip(names)
        .map(|(position, name)| AddTrack { position, name });

    StateMachine::with_initial(initial_tracks(), move |tracks| {
        (PlayerModel::new(&tracks), make(tracks.into_iter().collect()))
    })
        .named("music player")
        .constant(Play)
        .constant(Pause)
        .constant(Next)
        .command(add_track)
}

fn added_names(descriptions: &[String]) -> Vec<String> {
    descriptions
        .iter()
        .filter_map(|d| d.strip_prefix("AddTrack("))
        .filter_map(|rest| rest.split_once(", "))
        .map(|(_, name)| name.trim_end_matches(')').to_string())
        .collect()
}

#[test]
fn test_both_correct_players_agree_with_the_model() {
    let config = Config::default().with_tests(200).with_seed(3);

    let report = player_machine(IndexPlayer::correct, Gen::<String>::hex_string(1, 10))
        .run(&config)
        .unwrap();
    assert!(report.is_passed(), "{}", report);

    let report = player_machine(NamePlayer::new, Gen::<String>::hex_string(1, 10))
        .run(&config)
        .unwrap();
    assert!(report.is_passed(), "{}", report);
}

#[test]
fn test_duplicate_track_names_are_never_generated() {
    // Single hex digits: only 16 names, so duplicates are drawn constantly
    let machine = player_machine(IndexPlayer::correct, Gen::<String>::hex_string(1, 1));
    for seed in 0..100 {
        let sequence = machine.replay(seed, 100);
        let names = added_names(&sequence.descriptions());
        let distinct: BTreeSet<&String> = names.iter().collect();
        assert_eq!(distinct.len(), names.len(), "seed {seed}: {sequence}");
        assert!(names.len() <= 16);
    }
}

#[test]
fn test_exhausted_names_do_not_stop_generation() {
    let machine = player_machine(IndexPlayer::correct, Gen::<String>::hex_string(1, 1));
    let report = machine
        .run(&Config::default().with_tests(20).with_sequence_length(200).with_seed(8))
        .unwrap();
    assert!(report.is_passed(), "{}", report);
    assert_eq!(report.stats().exhausted, 0);
}

#[test]
fn test_forgotten_cursor_shift_shrinks_to_single_insert() {
    let report = player_machine(IndexPlayer::forgetful, Gen::<String>::hex_string(1, 10))
        .run_trials(100, 50, Some(12))
        .unwrap();
    let counterexample = report.counterexample().expect("the forgetful player must fail");

    // The starting tracks are not shrunk, so "0" may already be taken
    assert_eq!(counterexample.shrunk.len(), 1);
    let shrunk = &counterexample.shrunk[0];
    assert!(shrunk.starts_with("AddTrack(0, \""), "{shrunk}");
    let name = shrunk
        .trim_start_matches("AddTrack(0, \"")
        .trim_end_matches("\")");
    assert!(name.len() <= 2, "{shrunk}");
    assert!(name.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(counterexample.failing_index, 0);
    assert!(counterexample
        .failure
        .message
        .starts_with("current track changed"));
}

#[test]
fn test_starting_tracks_are_generated_per_trial() {
    let machine = player_machine(IndexPlayer::correct, Gen::<String>::hex_string(1, 10));
    let config = Config::default().with_size(100);

    let mut sizes = BTreeSet::new();
    for seed in 0..200 {
        let tracks = initial_tracks()
            .sample(Size(100), Seed::from_u64(seed))
            .unwrap();
        assert!((1..=10).contains(&tracks.len()));
        sizes.insert(tracks.len());
        assert_eq!(machine.replay_trial_with(&config, seed).unwrap(), Outcome::Passed);
    }
    assert!(sizes.contains(&1), "a single starting track was never drawn");
    assert!(sizes.len() > 5);
}

#[test]
fn test_single_track_player_stays_on_next() {
    for make in [IndexPlayer::correct as fn(Vec<String>) -> IndexPlayer, IndexPlayer::forgetful] {
        let mut player = make(vec!["solo".to_string()]);
        player.next();
        assert_eq!(player.current_track(), "solo");
    }
    let mut player = NamePlayer::new(vec!["solo".to_string()]);
    player.next();
    assert_eq!(player.current_track(), "solo");
}
