use super::models::*;
use super::schema::VIDEO_VERSIONED_SCHEMAS;
use super::VideoStore;
use crate::sqlite_persistence::open_versioned;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

const VIDEO_COLUMNS: &str = "id, filename, original_name, file_path, file_size, content_hash, \
     duration, fps, width, height, frame_count, analysis_status, analysis_progress, \
     analysis_message, uploaded_at, analyzed_at";

const FRAME_COLUMNS: &str = "id, video_id, image_id, timestamp, image_path, caption, \
     dominant_colors, setting, lighting, activity_level, complexity, brightness, edge_density";

const PERSON_COLUMNS: &str = "id, frame_id, video_id, person_index, bbox_x1, bbox_y1, bbox_x2, \
     bbox_y2, confidence, gender, gender_confidence, age_group, age_confidence, estimated_age, \
     upper_color, lower_color, analysis_source";

const OBJECT_COLUMNS: &str =
    "id, frame_id, video_id, class_name, confidence, bbox_x1, bbox_y1, bbox_x2, bbox_y2";

const MESSAGE_COLUMNS: &str = "id, session_id, role, content, frame_ids, created_at";

pub struct SqliteVideoStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteVideoStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned(db_path.as_ref(), VIDEO_VERSIONED_SCHEMAS, "video")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database (for testing).
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        VIDEO_VERSIONED_SCHEMAS
            .last()
            .context("No video schema defined")?
            .create(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn format_datetime(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339()
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    }

    fn row_to_video(row: &rusqlite::Row) -> rusqlite::Result<Video> {
        let uploaded_at: String = row.get("uploaded_at")?;
        let analyzed_at: Option<String> = row.get("analyzed_at")?;
        Ok(Video {
            id: row.get("id")?,
            filename: row.get("filename")?,
            original_name: row.get("original_name")?,
            file_path: row.get("file_path")?,
            file_size: row.get("file_size")?,
            content_hash: row.get("content_hash")?,
            duration: row.get("duration")?,
            fps: row.get("fps")?,
            width: row.get("width")?,
            height: row.get("height")?,
            frame_count: row.get("frame_count")?,
            analysis_status: AnalysisStatus::parse(&row.get::<_, String>("analysis_status")?)
                .unwrap_or(AnalysisStatus::Pending),
            analysis_progress: row.get("analysis_progress")?,
            analysis_message: row.get("analysis_message")?,
            uploaded_at: Self::parse_datetime(&uploaded_at).unwrap_or_else(Utc::now),
            analyzed_at: analyzed_at.as_deref().and_then(Self::parse_datetime),
        })
    }

    fn row_to_frame(row: &rusqlite::Row) -> rusqlite::Result<Frame> {
        let colors: String = row.get("dominant_colors")?;
        Ok(Frame {
            id: row.get("id")?,
            video_id: row.get("video_id")?,
            image_id: row.get("image_id")?,
            timestamp: row.get("timestamp")?,
            image_path: row.get("image_path")?,
            caption: row.get("caption")?,
            dominant_colors: serde_json::from_str(&colors).unwrap_or_default(),
            scene: SceneAttributes {
                setting: Setting::parse(&row.get::<_, String>("setting")?)
                    .unwrap_or(Setting::Indoor),
                lighting: Lighting::parse(&row.get::<_, String>("lighting")?)
                    .unwrap_or(Lighting::Normal),
                activity_level: ActivityLevel::parse(&row.get::<_, String>("activity_level")?)
                    .unwrap_or(ActivityLevel::Low),
                complexity: SceneComplexity::parse(&row.get::<_, String>("complexity")?)
                    .unwrap_or(SceneComplexity::Simple),
            },
            brightness: row.get("brightness")?,
            edge_density: row.get("edge_density")?,
            persons: Vec::new(),
            objects: Vec::new(),
        })
    }

    fn row_to_person(row: &rusqlite::Row) -> rusqlite::Result<PersonDetection> {
        Ok(PersonDetection {
            id: row.get("id")?,
            frame_id: row.get("frame_id")?,
            video_id: row.get("video_id")?,
            person_index: row.get("person_index")?,
            bbox: [
                row.get("bbox_x1")?,
                row.get("bbox_y1")?,
                row.get("bbox_x2")?,
                row.get("bbox_y2")?,
            ],
            confidence: row.get("confidence")?,
            gender: row.get("gender")?,
            gender_confidence: row.get("gender_confidence")?,
            age_group: row.get("age_group")?,
            age_confidence: row.get("age_confidence")?,
            estimated_age: row.get("estimated_age")?,
            upper_color: row.get("upper_color")?,
            lower_color: row.get("lower_color")?,
            analysis_source: row.get("analysis_source")?,
        })
    }

    fn row_to_object(row: &rusqlite::Row) -> rusqlite::Result<ObjectDetection> {
        Ok(ObjectDetection {
            id: row.get("id")?,
            frame_id: row.get("frame_id")?,
            video_id: row.get("video_id")?,
            class_name: row.get("class_name")?,
            confidence: row.get("confidence")?,
            bbox: [
                row.get("bbox_x1")?,
                row.get("bbox_y1")?,
                row.get("bbox_x2")?,
                row.get("bbox_y2")?,
            ],
        })
    }

    fn row_to_scene(row: &rusqlite::Row) -> rusqlite::Result<Scene> {
        let objects: String = row.get("dominant_objects")?;
        Ok(Scene {
            id: row.get("id")?,
            video_id: row.get("video_id")?,
            scene_index: row.get("scene_index")?,
            start_time: row.get("start_time")?,
            end_time: row.get("end_time")?,
            start_frame: row.get("start_frame")?,
            end_frame: row.get("end_frame")?,
            setting: Setting::parse(&row.get::<_, String>("setting")?).unwrap_or(Setting::Indoor),
            lighting: Lighting::parse(&row.get::<_, String>("lighting")?)
                .unwrap_or(Lighting::Normal),
            activity_level: ActivityLevel::parse(&row.get::<_, String>("activity_level")?)
                .unwrap_or(ActivityLevel::Low),
            dominant_objects: serde_json::from_str(&objects).unwrap_or_default(),
            caption: row.get("caption")?,
            frame_count: row.get("frame_count")?,
        })
    }

    fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<ChatMessage> {
        let frame_ids: String = row.get("frame_ids")?;
        let created_at: String = row.get("created_at")?;
        Ok(ChatMessage {
            id: row.get("id")?,
            session_id: row.get("session_id")?,
            role: ChatRole::parse(&row.get::<_, String>("role")?).unwrap_or(ChatRole::User),
            content: row.get("content")?,
            frame_ids: serde_json::from_str(&frame_ids).unwrap_or_default(),
            created_at: Self::parse_datetime(&created_at).unwrap_or_else(Utc::now),
        })
    }

    fn query_video(conn: &Connection, id: i64) -> Result<Option<Video>> {
        let video = conn
            .query_row(
                &format!("SELECT {} FROM videos WHERE id = ?1", VIDEO_COLUMNS),
                params![id],
                Self::row_to_video,
            )
            .optional()?;
        Ok(video)
    }

    /// Loads frames with `LIMIT`/`OFFSET` (a negative limit means no limit)
    /// and fills in their detections.
    fn query_frames(
        conn: &Connection,
        video_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Frame>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM frames WHERE video_id = ?1 ORDER BY timestamp, image_id LIMIT ?2 OFFSET ?3",
            FRAME_COLUMNS
        ))?;
        let mut frames = stmt
            .query_map(params![video_id, limit, offset], Self::row_to_frame)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Self::attach_detections(conn, video_id, &mut frames)?;
        Ok(frames)
    }

    fn attach_detections(conn: &Connection, video_id: i64, frames: &mut [Frame]) -> Result<()> {
        if frames.is_empty() {
            return Ok(());
        }

        let mut persons: HashMap<i64, Vec<PersonDetection>> = HashMap::new();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM person_detections WHERE video_id = ?1 ORDER BY frame_id, person_index",
            PERSON_COLUMNS
        ))?;
        for person in stmt.query_map(params![video_id], Self::row_to_person)? {
            let person = person?;
            persons.entry(person.frame_id).or_default().push(person);
        }

        let mut objects: HashMap<i64, Vec<ObjectDetection>> = HashMap::new();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM object_detections WHERE video_id = ?1 ORDER BY frame_id, id",
            OBJECT_COLUMNS
        ))?;
        for object in stmt.query_map(params![video_id], Self::row_to_object)? {
            let object = object?;
            objects.entry(object.frame_id).or_default().push(object);
        }

        for frame in frames.iter_mut() {
            frame.persons = persons.remove(&frame.id).unwrap_or_default();
            frame.objects = objects.remove(&frame.id).unwrap_or_default();
        }
        Ok(())
    }

    fn insert_frame(tx: &Transaction, video_id: i64, frame: &Frame) -> Result<()> {
        tx.execute(
            "INSERT INTO frames (video_id, image_id, timestamp, image_path, caption, dominant_colors,
                setting, lighting, activity_level, complexity, brightness, edge_density)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                video_id,
                frame.image_id,
                frame.timestamp,
                frame.image_path,
                frame.caption,
                serde_json::to_string(&frame.dominant_colors)?,
                frame.scene.setting.as_str(),
                frame.scene.lighting.as_str(),
                frame.scene.activity_level.as_str(),
                frame.scene.complexity.as_str(),
                frame.brightness,
                frame.edge_density,
            ],
        )
        .with_context(|| format!("Failed to insert frame {} of video {}", frame.image_id, video_id))?;
        let frame_id = tx.last_insert_rowid();

        for person in &frame.persons {
            tx.execute(
                "INSERT INTO person_detections (frame_id, video_id, person_index, bbox_x1, bbox_y1,
                    bbox_x2, bbox_y2, confidence, gender, gender_confidence, age_group,
                    age_confidence, estimated_age, upper_color, lower_color, analysis_source)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    frame_id,
                    video_id,
                    person.person_index,
                    person.bbox[0],
                    person.bbox[1],
                    person.bbox[2],
                    person.bbox[3],
                    person.confidence,
                    person.gender,
                    person.gender_confidence,
                    person.age_group,
                    person.age_confidence,
                    person.estimated_age,
                    person.upper_color,
                    person.lower_color,
                    person.analysis_source,
                ],
            )?;
        }

        for object in &frame.objects {
            tx.execute(
                "INSERT INTO object_detections (frame_id, video_id, class_name, confidence,
                    bbox_x1, bbox_y1, bbox_x2, bbox_y2)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    frame_id,
                    video_id,
                    object.class_name,
                    object.confidence,
                    object.bbox[0],
                    object.bbox[1],
                    object.bbox[2],
                    object.bbox[3],
                ],
            )?;
        }
        Ok(())
    }

    fn insert_scene(tx: &Transaction, video_id: i64, scene: &Scene) -> Result<()> {
        tx.execute(
            "INSERT INTO scenes (video_id, scene_index, start_time, end_time, start_frame, end_frame,
                setting, lighting, activity_level, dominant_objects, caption, frame_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                video_id,
                scene.scene_index,
                scene.start_time,
                scene.end_time,
                scene.start_frame,
                scene.end_frame,
                scene.setting.as_str(),
                scene.lighting.as_str(),
                scene.activity_level.as_str(),
                serde_json::to_string(&scene.dominant_objects)?,
                scene.caption,
                scene.frame_count,
            ],
        )?;
        Ok(())
    }
}

impl VideoStore for SqliteVideoStore {
    fn create_video(&self, video: &NewVideo) -> Result<Video> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO videos (filename, original_name, file_path, file_size, content_hash,
                analysis_status, analysis_progress, uploaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
            params![
                video.filename,
                video.original_name,
                video.file_path,
                video.file_size,
                video.content_hash,
                AnalysisStatus::Pending.as_str(),
                Self::format_datetime(&Utc::now()),
            ],
        )
        .with_context(|| format!("Failed to insert video {}", video.filename))?;
        let id = conn.last_insert_rowid();
        Self::query_video(&conn, id)?.context("Inserted video not found")
    }

    fn get_video(&self, id: i64) -> Result<Option<Video>> {
        let conn = self.conn.lock().unwrap();
        Self::query_video(&conn, id)
    }

    fn list_videos(&self) -> Result<Vec<Video>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM videos ORDER BY uploaded_at DESC, id DESC",
            VIDEO_COLUMNS
        ))?;
        let videos = stmt
            .query_map([], Self::row_to_video)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(videos)
    }

    fn list_videos_by_status(&self, status: AnalysisStatus) -> Result<Vec<Video>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM videos WHERE analysis_status = ?1 ORDER BY uploaded_at DESC, id DESC",
            VIDEO_COLUMNS
        ))?;
        let videos = stmt
            .query_map(params![status.as_str()], Self::row_to_video)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(videos)
    }

    fn count_videos(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM videos", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn rename_video(&self, id: i64, original_name: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE videos SET original_name = ?1 WHERE id = ?2",
            params![original_name, id],
        )?;
        Ok(changed > 0)
    }

    fn delete_video(&self, id: i64) -> Result<Option<Video>> {
        let conn = self.conn.lock().unwrap();
        let Some(video) = Self::query_video(&conn, id)? else {
            return Ok(None);
        };
        conn.execute("DELETE FROM videos WHERE id = ?1", params![id])?;
        debug!("Deleted video {} ({})", id, video.filename);
        Ok(Some(video))
    }

    fn update_analysis_state(
        &self,
        id: i64,
        status: AnalysisStatus,
        progress: i64,
        message: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE videos SET analysis_status = ?1, analysis_progress = ?2, analysis_message = ?3
             WHERE id = ?4",
            params![status.as_str(), progress.clamp(0, 100), message, id],
        )?;
        Ok(())
    }

    fn fail_if_status(&self, id: i64, expected: AnalysisStatus, message: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE videos SET analysis_status = ?1, analysis_progress = 0, analysis_message = ?2
             WHERE id = ?3 AND analysis_status = ?4",
            params![AnalysisStatus::Failed.as_str(), message, id, expected.as_str()],
        )?;
        Ok(changed > 0)
    }

    fn set_media_info(&self, id: i64, info: &MediaInfo) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE videos SET duration = ?1, fps = ?2, width = ?3, height = ?4, frame_count = ?5
             WHERE id = ?6",
            params![
                info.duration,
                info.fps,
                info.width,
                info.height,
                info.frame_count,
                id
            ],
        )?;
        Ok(())
    }

    fn save_analysis_results(&self, video_id: i64, results: &AnalysisResults) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        // Detections go with their frames through the cascade.
        tx.execute("DELETE FROM frames WHERE video_id = ?1", params![video_id])?;
        tx.execute("DELETE FROM scenes WHERE video_id = ?1", params![video_id])?;
        tx.execute(
            "DELETE FROM analysis_summaries WHERE video_id = ?1",
            params![video_id],
        )?;

        for frame in &results.frames {
            Self::insert_frame(&tx, video_id, frame)?;
        }
        for scene in &results.scenes {
            Self::insert_scene(&tx, video_id, scene)?;
        }

        let now = Self::format_datetime(&Utc::now());
        tx.execute(
            "INSERT INTO analysis_summaries (video_id, summary, created_at) VALUES (?1, ?2, ?3)",
            params![video_id, serde_json::to_string(&results.summary)?, now],
        )?;
        tx.execute(
            "UPDATE videos SET analysis_status = ?1, analysis_progress = 100,
                analysis_message = ?2, analyzed_at = ?3
             WHERE id = ?4",
            params![
                AnalysisStatus::Completed.as_str(),
                format!("Analysis completed: {} frames", results.frames.len()),
                now,
                video_id
            ],
        )?;

        tx.commit()?;
        debug!(
            "Saved {} frames and {} scenes for video {}",
            results.frames.len(),
            results.scenes.len(),
            video_id
        );
        Ok(())
    }

    fn get_frames(&self, video_id: i64) -> Result<Vec<Frame>> {
        let conn = self.conn.lock().unwrap();
        Self::query_frames(&conn, video_id, -1, 0)
    }

    fn get_frames_page(&self, video_id: i64, limit: usize, offset: usize) -> Result<Vec<Frame>> {
        let conn = self.conn.lock().unwrap();
        Self::query_frames(&conn, video_id, limit as i64, offset as i64)
    }

    fn get_frame(&self, video_id: i64, image_id: i64) -> Result<Option<Frame>> {
        let conn = self.conn.lock().unwrap();
        let frame = conn
            .query_row(
                &format!(
                    "SELECT {} FROM frames WHERE video_id = ?1 AND image_id = ?2",
                    FRAME_COLUMNS
                ),
                params![video_id, image_id],
                Self::row_to_frame,
            )
            .optional()?;
        let Some(frame) = frame else {
            return Ok(None);
        };

        let mut frames = [frame];
        Self::attach_detections(&conn, video_id, &mut frames)?;
        let [frame] = frames;
        Ok(Some(frame))
    }

    fn count_frames(&self, video_id: i64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM frames WHERE video_id = ?1",
            params![video_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn get_scenes(&self, video_id: i64) -> Result<Vec<Scene>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, video_id, scene_index, start_time, end_time, start_frame, end_frame,
                setting, lighting, activity_level, dominant_objects, caption, frame_count
             FROM scenes WHERE video_id = ?1 ORDER BY scene_index",
        )?;
        let scenes = stmt
            .query_map(params![video_id], Self::row_to_scene)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(scenes)
    }

    fn get_summary(&self, video_id: i64) -> Result<Option<AnalysisSummary>> {
        let conn = self.conn.lock().unwrap();
        let raw: Option<String> = conn
            .query_row(
                "SELECT summary FROM analysis_summaries WHERE video_id = ?1",
                params![video_id],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw).with_context(|| {
                format!("Corrupted analysis summary for video {}", video_id)
            })?)),
            None => Ok(None),
        }
    }

    fn list_video_ids(&self) -> Result<Vec<i64>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id FROM videos")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    fn create_chat_session(&self, video_id: Option<i64>) -> Result<ChatSession> {
        let conn = self.conn.lock().unwrap();
        let session = ChatSession {
            id: uuid::Uuid::new_v4().to_string(),
            video_id,
            created_at: Utc::now(),
        };
        conn.execute(
            "INSERT INTO chat_sessions (id, video_id, created_at) VALUES (?1, ?2, ?3)",
            params![
                session.id,
                session.video_id,
                Self::format_datetime(&session.created_at)
            ],
        )?;
        Ok(session)
    }

    fn get_chat_session(&self, id: &str) -> Result<Option<ChatSession>> {
        let conn = self.conn.lock().unwrap();
        let session = conn
            .query_row(
                "SELECT id, video_id, created_at FROM chat_sessions WHERE id = ?1",
                params![id],
                |row| {
                    let created_at: String = row.get(2)?;
                    Ok(ChatSession {
                        id: row.get(0)?,
                        video_id: row.get(1)?,
                        created_at: Self::parse_datetime(&created_at).unwrap_or_else(Utc::now),
                    })
                },
            )
            .optional()?;
        Ok(session)
    }

    fn append_chat_message(
        &self,
        session_id: &str,
        role: ChatRole,
        content: &str,
        frame_ids: &[i64],
    ) -> Result<ChatMessage> {
        let conn = self.conn.lock().unwrap();
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO chat_messages (session_id, role, content, frame_ids, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session_id,
                role.as_str(),
                content,
                serde_json::to_string(frame_ids)?,
                Self::format_datetime(&created_at)
            ],
        )
        .with_context(|| format!("Failed to append message to chat session {}", session_id))?;
        Ok(ChatMessage {
            id: conn.last_insert_rowid(),
            session_id: session_id.to_string(),
            role,
            content: content.to_string(),
            frame_ids: frame_ids.to_vec(),
            created_at,
        })
    }

    fn get_recent_chat_messages(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM chat_messages WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2",
            MESSAGE_COLUMNS
        ))?;
        let mut messages = stmt
            .query_map(params![session_id, limit as i64], Self::row_to_message)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        messages.reverse();
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite_persistence::BASE_DB_VERSION;
    use tempfile::TempDir;

    fn new_video(name: &str) -> NewVideo {
        NewVideo {
            filename: format!("stored_{}", name),
            original_name: name.to_string(),
            file_path: format!("/tmp/uploads/stored_{}", name),
            file_size: 1024,
            content_hash: "abc123".to_string(),
        }
    }

    fn person(index: i64, upper: &str) -> PersonDetection {
        PersonDetection {
            id: 0,
            frame_id: 0,
            video_id: 0,
            person_index: index,
            bbox: [0.1, 0.1, 0.4, 0.9],
            confidence: 0.9,
            gender: "male".to_string(),
            gender_confidence: 0.8,
            age_group: "young_adult".to_string(),
            age_confidence: 0.7,
            estimated_age: Some(28),
            upper_color: upper.to_string(),
            lower_color: "blue".to_string(),
            analysis_source: "detector".to_string(),
        }
    }

    fn frame(image_id: i64, timestamp: f64, persons: Vec<PersonDetection>) -> Frame {
        Frame {
            id: 0,
            video_id: 0,
            image_id,
            timestamp,
            image_path: None,
            caption: Some(format!("frame {}", image_id)),
            dominant_colors: vec![ColorTag {
                color: "red".to_string(),
                ratio: 0.3,
                confidence: 0.6,
            }],
            scene: SceneAttributes {
                setting: Setting::Outdoor,
                lighting: Lighting::Bright,
                activity_level: ActivityLevel::Medium,
                complexity: SceneComplexity::Medium,
            },
            brightness: 160.0,
            edge_density: 0.03,
            persons,
            objects: vec![ObjectDetection {
                id: 0,
                frame_id: 0,
                video_id: 0,
                class_name: "car".to_string(),
                confidence: 0.75,
                bbox: [0.5, 0.5, 0.9, 0.9],
            }],
        }
    }

    fn summary() -> AnalysisSummary {
        AnalysisSummary {
            quality_assessment: QualityAssessment {
                overall_score: 0.6,
                status: "good".to_string(),
                brightness_score: 1.0,
                contrast_score: 0.5,
                sharpness_score: 0.3,
                color_balance_score: 0.6,
            },
            scene_diversity: SceneDiversity::default(),
            temporal_analysis: TemporalAnalysis::default(),
            key_insights: vec!["Video quality is good".to_string()],
            total_detections: 2,
            unique_persons: 1,
            stats: ProcessingStats::default(),
        }
    }

    fn results(frames: Vec<Frame>) -> AnalysisResults {
        AnalysisResults {
            scenes: vec![Scene {
                id: 0,
                video_id: 0,
                scene_index: 0,
                start_time: 0.0,
                end_time: 2.0,
                start_frame: 1,
                end_frame: frames.len() as i64,
                setting: Setting::Outdoor,
                lighting: Lighting::Bright,
                activity_level: ActivityLevel::Medium,
                dominant_objects: vec!["car".to_string()],
                caption: None,
                frame_count: frames.len() as i64,
            }],
            frames,
            summary: summary(),
        }
    }

    #[test]
    fn creates_and_lists_videos_newest_first() {
        let store = SqliteVideoStore::in_memory().unwrap();
        let first = store.create_video(&new_video("a.mp4")).unwrap();
        let second = store.create_video(&new_video("b.mp4")).unwrap();

        assert_eq!(first.analysis_status, AnalysisStatus::Pending);
        assert_eq!(first.analysis_progress, 0);
        assert!(!first.is_analyzed());

        let listed = store.list_videos().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(store.count_videos().unwrap(), 2);
    }

    #[test]
    fn rename_reports_missing_video() {
        let store = SqliteVideoStore::in_memory().unwrap();
        let video = store.create_video(&new_video("a.mp4")).unwrap();

        assert!(store.rename_video(video.id, "holiday.mp4").unwrap());
        assert!(!store.rename_video(video.id + 100, "nope.mp4").unwrap());
        assert_eq!(
            store.get_video(video.id).unwrap().unwrap().original_name,
            "holiday.mp4"
        );
    }

    #[test]
    fn progress_is_clamped() {
        let store = SqliteVideoStore::in_memory().unwrap();
        let video = store.create_video(&new_video("a.mp4")).unwrap();

        store
            .update_analysis_state(video.id, AnalysisStatus::Analyzing, 250, Some("busy"))
            .unwrap();
        let fetched = store.get_video(video.id).unwrap().unwrap();
        assert_eq!(fetched.analysis_progress, 100);
        assert_eq!(fetched.analysis_message.as_deref(), Some("busy"));

        store
            .update_analysis_state(video.id, AnalysisStatus::Analyzing, -5, None)
            .unwrap();
        assert_eq!(store.get_video(video.id).unwrap().unwrap().analysis_progress, 0);
    }

    #[test]
    fn conditional_failure_checks_the_current_status() {
        let store = SqliteVideoStore::in_memory().unwrap();
        let video = store.create_video(&new_video("a.mp4")).unwrap();
        store
            .update_analysis_state(video.id, AnalysisStatus::Completed, 100, Some("done"))
            .unwrap();

        assert!(!store
            .fail_if_status(video.id, AnalysisStatus::Analyzing, "interrupted")
            .unwrap());
        let fetched = store.get_video(video.id).unwrap().unwrap();
        assert_eq!(fetched.analysis_status, AnalysisStatus::Completed);
        assert_eq!(fetched.analysis_message.as_deref(), Some("done"));

        assert!(store
            .fail_if_status(video.id, AnalysisStatus::Completed, "no results")
            .unwrap());
        let fetched = store.get_video(video.id).unwrap().unwrap();
        assert_eq!(fetched.analysis_status, AnalysisStatus::Failed);
        assert_eq!(fetched.analysis_progress, 0);
        assert_eq!(fetched.analysis_message.as_deref(), Some("no results"));
    }

    #[test]
    fn saves_results_with_detections() {
        let store = SqliteVideoStore::in_memory().unwrap();
        let video = store.create_video(&new_video("a.mp4")).unwrap();
        store
            .save_analysis_results(
                video.id,
                &results(vec![
                    frame(1, 0.0, vec![person(0, "red"), person(1, "black")]),
                    frame(2, 1.0, vec![]),
                ]),
            )
            .unwrap();

        let video = store.get_video(video.id).unwrap().unwrap();
        assert!(video.is_analyzed());
        assert_eq!(video.analysis_progress, 100);
        assert!(video.analyzed_at.is_some());

        let frames = store.get_frames(video.id).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].persons.len(), 2);
        assert_eq!(frames[0].persons[1].upper_color, "black");
        assert_eq!(frames[0].objects[0].class_name, "car");
        assert_eq!(frames[0].dominant_colors[0].color, "red");
        assert!(frames[1].persons.is_empty());

        let single = store.get_frame(video.id, 1).unwrap().unwrap();
        assert_eq!(single.persons.len(), 2);
        assert!(store.get_frame(video.id, 99).unwrap().is_none());

        assert_eq!(store.get_scenes(video.id).unwrap().len(), 1);
        assert_eq!(
            store.get_summary(video.id).unwrap().unwrap().quality_assessment.status,
            "good"
        );
    }

    #[test]
    fn rerunning_analysis_replaces_previous_results() {
        let store = SqliteVideoStore::in_memory().unwrap();
        let video = store.create_video(&new_video("a.mp4")).unwrap();
        store
            .save_analysis_results(
                video.id,
                &results(vec![
                    frame(1, 0.0, vec![person(0, "red")]),
                    frame(2, 1.0, vec![]),
                    frame(3, 2.0, vec![]),
                ]),
            )
            .unwrap();
        store
            .save_analysis_results(video.id, &results(vec![frame(1, 0.5, vec![])]))
            .unwrap();

        let frames = store.get_frames(video.id).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].timestamp, 0.5);
        assert!(frames[0].persons.is_empty());
        assert_eq!(store.count_frames(video.id).unwrap(), 1);
    }

    #[test]
    fn frames_page_respects_limit_and_offset() {
        let store = SqliteVideoStore::in_memory().unwrap();
        let video = store.create_video(&new_video("a.mp4")).unwrap();
        let frames = (1..=5).map(|i| frame(i, i as f64, vec![])).collect();
        store.save_analysis_results(video.id, &results(frames)).unwrap();

        let page = store.get_frames_page(video.id, 2, 2).unwrap();
        assert_eq!(
            page.iter().map(|f| f.image_id).collect::<Vec<_>>(),
            vec![3, 4]
        );
    }

    #[test]
    fn delete_cascades_to_results_and_chat() {
        let store = SqliteVideoStore::in_memory().unwrap();
        let video = store.create_video(&new_video("a.mp4")).unwrap();
        store
            .save_analysis_results(video.id, &results(vec![frame(1, 0.0, vec![person(0, "red")])]))
            .unwrap();
        let session = store.create_chat_session(Some(video.id)).unwrap();
        store
            .append_chat_message(&session.id, ChatRole::User, "hi", &[])
            .unwrap();

        let deleted = store.delete_video(video.id).unwrap().unwrap();
        assert_eq!(deleted.filename, "stored_a.mp4");
        assert!(store.get_video(video.id).unwrap().is_none());
        assert!(store.get_frames(video.id).unwrap().is_empty());
        assert!(store.get_scenes(video.id).unwrap().is_empty());
        assert!(store.get_summary(video.id).unwrap().is_none());
        assert!(store.get_chat_session(&session.id).unwrap().is_none());
        assert!(store.delete_video(video.id).unwrap().is_none());
    }

    #[test]
    fn recent_chat_messages_are_chronological() {
        let store = SqliteVideoStore::in_memory().unwrap();
        let session = store.create_chat_session(None).unwrap();
        for i in 0..5 {
            let role = if i % 2 == 0 {
                ChatRole::User
            } else {
                ChatRole::Assistant
            };
            store
                .append_chat_message(&session.id, role, &format!("message {}", i), &[i])
                .unwrap();
        }

        let recent = store.get_recent_chat_messages(&session.id, 3).unwrap();
        assert_eq!(
            recent.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(),
            vec!["message 2", "message 3", "message 4"]
        );
        assert_eq!(recent[0].frame_ids, vec![2]);
        assert_eq!(recent[0].role, ChatRole::User);
    }

    #[test]
    fn reopening_v1_database_migrates_to_latest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("videos.db");
        {
            let conn = Connection::open(&path).unwrap();
            VIDEO_VERSIONED_SCHEMAS[0].create(&conn).unwrap();
        }

        let store = SqliteVideoStore::new(&path).unwrap();
        let session = store.create_chat_session(None).unwrap();
        assert!(store.get_chat_session(&session.id).unwrap().is_some());

        let conn = store.conn.lock().unwrap();
        let version: i64 = conn
            .query_row("PRAGMA user_version;", [], |r| r.get(0))
            .unwrap();
        assert_eq!(
            version as usize,
            BASE_DB_VERSION + VIDEO_VERSIONED_SCHEMAS.last().unwrap().version
        );
    }
}
