//! Animation graph assembly: sequences, tracks and playbacks.
//!
//! The animation data is graph-shaped: tracks hold keyframe data,
//! sequences bind tracks to nodes (by track id or by position in the
//! delivered track list), playbacks schedule sequences in time. The
//! context accumulates all three and hands them to the sink exactly once,
//! when the sequences, tracks and views queues are simultaneously empty.

use serde_json::Value;

use crate::builder::{Joint, Playback, SceneBuilder, Sequence, SequenceTrack, Track};
use crate::context::SceneContext;
use crate::error::{SceneError, SceneResult};
use crate::payload::{self, PlaybackPayload, SequencePayload, TrackPayload};
use crate::queue::RequestCategory;

impl<S: SceneBuilder> SceneContext<S> {
    /// Applies a batch of animation sequences.
    ///
    /// Track references by id may arrive before the track itself and are
    /// enqueued; references by positional index require the track list to
    /// be known already and are reported otherwise.
    pub fn set_sequence(&mut self, value: Value) -> SceneResult<Vec<SceneError>> {
        let payloads: Vec<SequencePayload> = payload::parse_array("set_sequence", value)?;
        let mut errors = Vec::new();
        let meta = self.request_meta();

        for sequence in &payloads {
            let Some(id) = sequence.id.clone() else {
                errors.push(SceneError::MalformedPayload {
                    context: "set_sequence",
                    reason: "sequence without id".into(),
                });
                continue;
            };
            self.queues.get_mut(RequestCategory::Sequences).pop(&id);

            let mut tracks = Vec::new();
            for reference in &sequence.tracks {
                let track_id = match (&reference.track, reference.index) {
                    (Some(track), _) => Some(track.clone()),
                    (None, Some(index)) => match self.track_order.get(index) {
                        Some(track) => Some(track.clone()),
                        None => {
                            errors.push(SceneError::UnknownTrackIndex {
                                sequence: id.clone(),
                                index,
                            });
                            None
                        }
                    },
                    (None, None) => None,
                };
                let Some(track_id) = track_id else { continue };

                if !self.tracks.contains_key(&track_id) {
                    self.queues
                        .get_mut(RequestCategory::Tracks)
                        .push(track_id.clone(), meta.clone());
                }
                tracks.push(SequenceTrack {
                    track_id,
                    node_sid: reference.sid.clone(),
                    binding: reference.binding.clone(),
                });
            }

            let joints = sequence
                .joints
                .iter()
                .map(|joint| Joint {
                    id: joint.id.clone(),
                    parent: joint.parent.clone(),
                    node_sid: joint.sid.clone(),
                })
                .collect();

            self.sequences.insert(
                id.clone(),
                Sequence {
                    id,
                    name: sequence.name.clone(),
                    duration: sequence.duration,
                    joints,
                    tracks,
                },
            );
        }

        self.try_finalize_animation();
        self.check_scene_completion();
        Ok(errors)
    }

    /// Applies a batch of animation tracks.
    ///
    /// The delivery order defines the positional index space sequences may
    /// reference. Cyclic markers pass through untouched.
    pub fn set_track(&mut self, value: Value) -> SceneResult<Vec<SceneError>> {
        let payloads: Vec<TrackPayload> = payload::parse_array("set_track", value)?;
        let mut errors = Vec::new();

        for track in payloads {
            let Some(id) = track.id.clone() else {
                errors.push(SceneError::MalformedPayload {
                    context: "set_track",
                    reason: "track without id".into(),
                });
                continue;
            };
            self.queues.get_mut(RequestCategory::Tracks).pop(&id);

            if !self.track_order.contains(&id) {
                self.track_order.push(id.clone());
            }
            self.tracks.insert(
                id.clone(),
                Track {
                    id,
                    times: track.times,
                    values: track.values,
                    interpolation: track.interpolation,
                    cyclic_start: track.cyclic_start,
                    cyclic_end: track.cyclic_end,
                },
            );
        }

        self.try_finalize_animation();
        self.check_scene_completion();
        Ok(errors)
    }

    /// Applies a batch of playback definitions.
    pub fn set_playback(&mut self, value: Value) -> SceneResult<Vec<SceneError>> {
        let payloads: Vec<PlaybackPayload> = payload::parse_array("set_playback", value)?;
        let mut errors = Vec::new();
        for playback in &payloads {
            self.handle_playback(playback, &mut errors);
        }
        self.try_finalize_animation();
        self.check_scene_completion();
        Ok(errors)
    }

    /// Stores one playback and requests its sequence if unknown.
    pub(crate) fn handle_playback(
        &mut self,
        payload: &PlaybackPayload,
        errors: &mut Vec<SceneError>,
    ) {
        let Some(id) = payload.id.clone() else {
            errors.push(SceneError::MalformedPayload {
                context: "set_playback",
                reason: "playback without id".into(),
            });
            return;
        };

        let meta = self.request_meta();
        if let Some(sequence_id) = &payload.sequence_id {
            if !self.sequences.contains_key(sequence_id) {
                self.queues
                    .get_mut(RequestCategory::Sequences)
                    .push(sequence_id.clone(), meta);
            }
        }

        let playback = Playback {
            id,
            sequence_id: payload.sequence_id.clone(),
            start: payload.start,
            time_scale: payload.time_scale,
            pre_delay: payload.pre_delay,
            post_delay: payload.post_delay,
            repeat: payload.repeat,
            reversed: payload.reversed.unwrap_or(false),
        };
        self.playbacks.retain(|p| p.id != playback.id);
        self.playbacks.push(playback.clone());
        self.events.set_playback.notify(&playback);
    }

    /// Hands the assembled animation over to the sink.
    ///
    /// Fires at most once, and only when the sequences, tracks and views
    /// queues are simultaneously empty. Does nothing while any animation
    /// input can still arrive, or when no animation exists at all.
    pub(crate) fn try_finalize_animation(&mut self) {
        if self.animation_finalized {
            return;
        }
        if self.sequences.is_empty() && self.tracks.is_empty() && self.playbacks.is_empty() {
            return;
        }
        let idle = self.queues.get(RequestCategory::Sequences).is_empty()
            && self.queues.get(RequestCategory::Tracks).is_empty()
            && self.queues.get(RequestCategory::Views).is_empty();
        if !idle {
            return;
        }

        self.animation_finalized = true;

        let mut sequences: Vec<Sequence> = self.sequences.values().cloned().collect();
        sequences.sort_by(|a, b| a.id.cmp(&b.id));
        let tracks: Vec<Track> = self
            .track_order
            .iter()
            .filter_map(|id| self.tracks.get(id).cloned())
            .collect();

        self.builder.finalize_animation(&sequences, &tracks);
        self.builder.finalize_playbacks(&self.playbacks);
    }
}
