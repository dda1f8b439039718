//! Grouping of sampled frames into scenes.

use crate::video_store::{Frame, Scene};
use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

/// Object classes visible in a frame, persons included.
fn frame_objects(frame: &Frame) -> BTreeSet<String> {
    let mut objects: BTreeSet<String> = frame
        .objects
        .iter()
        .map(|o| o.class_name.clone())
        .collect();
    if !frame.persons.is_empty() {
        objects.insert("person".to_string());
    }
    objects
}

fn most_frequent<T: Copy + Eq + Hash>(values: impl Iterator<Item = T>) -> Option<T> {
    let mut counts: HashMap<T, usize> = HashMap::new();
    let mut order = Vec::new();
    for value in values {
        let count = counts.entry(value).or_insert(0);
        if *count == 0 {
            order.push(value);
        }
        *count += 1;
    }
    // first seen wins ties
    order.into_iter().max_by(|a, b| {
        counts[a]
            .cmp(&counts[b])
            .then(std::cmp::Ordering::Greater)
    })
}

fn build_scene(index: usize, frames: &[&Frame], objects: BTreeSet<String>) -> Option<Scene> {
    let first = frames.first()?;
    let last = frames.last()?;
    Some(Scene {
        id: 0,
        video_id: first.video_id,
        scene_index: index as i64,
        start_time: first.timestamp,
        end_time: last.timestamp,
        start_frame: first.image_id,
        end_frame: last.image_id,
        setting: first.scene.setting,
        lighting: most_frequent(frames.iter().map(|f| f.scene.lighting))?,
        activity_level: most_frequent(frames.iter().map(|f| f.scene.activity_level))?,
        dominant_objects: objects.into_iter().collect(),
        caption: frames.iter().find_map(|f| f.caption.clone()),
        frame_count: frames.len() as i64,
    })
}

/// Merge consecutive frames while their setting and object set stay the same.
/// `frames` must be ordered by timestamp.
pub fn segment_scenes(frames: &[Frame]) -> Vec<Scene> {
    let mut scenes = Vec::new();
    let mut current: Vec<&Frame> = Vec::new();
    let mut current_objects = BTreeSet::new();

    for frame in frames {
        let objects = frame_objects(frame);
        let same_scene = current
            .last()
            .is_some_and(|prev| prev.scene.setting == frame.scene.setting && objects == current_objects);
        if !same_scene && !current.is_empty() {
            let finished = std::mem::take(&mut current);
            let finished_objects = std::mem::take(&mut current_objects);
            scenes.extend(build_scene(scenes.len(), &finished, finished_objects));
        }
        if current.is_empty() {
            current_objects = objects;
        }
        current.push(frame);
    }
    scenes.extend(build_scene(scenes.len(), &current, current_objects));
    scenes
}
