//! SQLite schema definitions for the video database.
//!
//! Videos own everything else: frames, detections, scenes, the analysis
//! summary and chat sessions are all removed with `ON DELETE CASCADE`.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema,
};

const VIDEO_FK: ForeignKey = ForeignKey {
    foreign_table: "videos",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const FRAME_FK: ForeignKey = ForeignKey {
    foreign_table: "frames",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const CHAT_SESSION_FK: ForeignKey = ForeignKey {
    foreign_table: "chat_sessions",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

// =============================================================================
// Version 1 - Videos and analysis results
// =============================================================================

const VIDEOS_TABLE_V1: Table = Table {
    name: "videos",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("filename", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("original_name", &SqlType::Text, non_null = true),
        sqlite_column!("file_path", &SqlType::Text, non_null = true),
        sqlite_column!("file_size", &SqlType::Integer, non_null = true),
        sqlite_column!("content_hash", &SqlType::Text, non_null = true),
        sqlite_column!("duration", &SqlType::Real),
        sqlite_column!("fps", &SqlType::Real),
        sqlite_column!("width", &SqlType::Integer),
        sqlite_column!("height", &SqlType::Integer),
        sqlite_column!("frame_count", &SqlType::Integer),
        sqlite_column!(
            "analysis_status",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'pending'")
        ),
        sqlite_column!(
            "analysis_progress",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("analysis_message", &SqlType::Text),
        sqlite_column!("uploaded_at", &SqlType::Text, non_null = true),
        sqlite_column!("analyzed_at", &SqlType::Text),
    ],
    indices: &[("idx_videos_status", "analysis_status")],
    unique_constraints: &[],
};

const FRAMES_TABLE_V1: Table = Table {
    name: "frames",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "video_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&VIDEO_FK)
        ),
        sqlite_column!("image_id", &SqlType::Integer, non_null = true),
        sqlite_column!("timestamp", &SqlType::Real, non_null = true),
        sqlite_column!("image_path", &SqlType::Text),
        sqlite_column!("caption", &SqlType::Text),
        // JSON array of {color, ratio, confidence}
        sqlite_column!("dominant_colors", &SqlType::Text, non_null = true),
        sqlite_column!("setting", &SqlType::Text, non_null = true),
        sqlite_column!("lighting", &SqlType::Text, non_null = true),
        sqlite_column!("activity_level", &SqlType::Text, non_null = true),
        sqlite_column!("complexity", &SqlType::Text, non_null = true),
        sqlite_column!("brightness", &SqlType::Real, non_null = true),
        sqlite_column!("edge_density", &SqlType::Real, non_null = true),
    ],
    indices: &[("idx_frames_video_timestamp", "video_id, timestamp")],
    unique_constraints: &[&["video_id", "image_id"]],
};

const PERSON_DETECTIONS_TABLE_V1: Table = Table {
    name: "person_detections",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "frame_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&FRAME_FK)
        ),
        sqlite_column!(
            "video_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&VIDEO_FK)
        ),
        sqlite_column!("person_index", &SqlType::Integer, non_null = true),
        sqlite_column!("bbox_x1", &SqlType::Real, non_null = true),
        sqlite_column!("bbox_y1", &SqlType::Real, non_null = true),
        sqlite_column!("bbox_x2", &SqlType::Real, non_null = true),
        sqlite_column!("bbox_y2", &SqlType::Real, non_null = true),
        sqlite_column!("confidence", &SqlType::Real, non_null = true),
        sqlite_column!("gender", &SqlType::Text, non_null = true),
        sqlite_column!("gender_confidence", &SqlType::Real, non_null = true),
        sqlite_column!("age_group", &SqlType::Text, non_null = true),
        sqlite_column!("age_confidence", &SqlType::Real, non_null = true),
        sqlite_column!("estimated_age", &SqlType::Integer),
        sqlite_column!("upper_color", &SqlType::Text, non_null = true),
        sqlite_column!("lower_color", &SqlType::Text, non_null = true),
        sqlite_column!("analysis_source", &SqlType::Text, non_null = true),
    ],
    indices: &[
        ("idx_person_detections_frame", "frame_id"),
        ("idx_person_detections_video", "video_id"),
    ],
    unique_constraints: &[],
};

const OBJECT_DETECTIONS_TABLE_V1: Table = Table {
    name: "object_detections",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "frame_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&FRAME_FK)
        ),
        sqlite_column!(
            "video_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&VIDEO_FK)
        ),
        sqlite_column!("class_name", &SqlType::Text, non_null = true),
        sqlite_column!("confidence", &SqlType::Real, non_null = true),
        sqlite_column!("bbox_x1", &SqlType::Real, non_null = true),
        sqlite_column!("bbox_y1", &SqlType::Real, non_null = true),
        sqlite_column!("bbox_x2", &SqlType::Real, non_null = true),
        sqlite_column!("bbox_y2", &SqlType::Real, non_null = true),
    ],
    indices: &[
        ("idx_object_detections_frame", "frame_id"),
        ("idx_object_detections_video_class", "video_id, class_name"),
    ],
    unique_constraints: &[],
};

const SCENES_TABLE_V1: Table = Table {
    name: "scenes",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "video_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&VIDEO_FK)
        ),
        sqlite_column!("scene_index", &SqlType::Integer, non_null = true),
        sqlite_column!("start_time", &SqlType::Real, non_null = true),
        sqlite_column!("end_time", &SqlType::Real, non_null = true),
        sqlite_column!("start_frame", &SqlType::Integer, non_null = true),
        sqlite_column!("end_frame", &SqlType::Integer, non_null = true),
        sqlite_column!("setting", &SqlType::Text, non_null = true),
        sqlite_column!("lighting", &SqlType::Text, non_null = true),
        sqlite_column!("activity_level", &SqlType::Text, non_null = true),
        // JSON array of class names
        sqlite_column!("dominant_objects", &SqlType::Text, non_null = true),
        sqlite_column!("caption", &SqlType::Text),
        sqlite_column!("frame_count", &SqlType::Integer, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[&["video_id", "scene_index"]],
};

const ANALYSIS_SUMMARIES_TABLE_V1: Table = Table {
    name: "analysis_summaries",
    columns: &[
        sqlite_column!(
            "video_id",
            &SqlType::Integer,
            is_primary_key = true,
            foreign_key = Some(&VIDEO_FK)
        ),
        sqlite_column!("summary", &SqlType::Text, non_null = true),
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[],
};

// =============================================================================
// Version 2 - Chat sessions and messages
// =============================================================================

const CHAT_SESSIONS_TABLE_V2: Table = Table {
    name: "chat_sessions",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("video_id", &SqlType::Integer, foreign_key = Some(&VIDEO_FK)),
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[],
};

const CHAT_MESSAGES_TABLE_V2: Table = Table {
    name: "chat_messages",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "session_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&CHAT_SESSION_FK)
        ),
        sqlite_column!("role", &SqlType::Text, non_null = true),
        sqlite_column!("content", &SqlType::Text, non_null = true),
        sqlite_column!(
            "frame_ids",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'[]'")
        ),
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_chat_messages_session", "session_id, id")],
    unique_constraints: &[],
};

fn migrate_v1_to_v2(conn: &rusqlite::Connection) -> anyhow::Result<()> {
    CHAT_SESSIONS_TABLE_V2.create(conn)?;
    CHAT_MESSAGES_TABLE_V2.create(conn)?;
    Ok(())
}

pub const VIDEO_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 1,
        tables: &[
            VIDEOS_TABLE_V1,
            FRAMES_TABLE_V1,
            PERSON_DETECTIONS_TABLE_V1,
            OBJECT_DETECTIONS_TABLE_V1,
            SCENES_TABLE_V1,
            ANALYSIS_SUMMARIES_TABLE_V1,
        ],
        migration: None,
    },
    VersionedSchema {
        version: 2,
        tables: &[
            VIDEOS_TABLE_V1,
            FRAMES_TABLE_V1,
            PERSON_DETECTIONS_TABLE_V1,
            OBJECT_DETECTIONS_TABLE_V1,
            SCENES_TABLE_V1,
            ANALYSIS_SUMMARIES_TABLE_V1,
            CHAT_SESSIONS_TABLE_V2,
            CHAT_MESSAGES_TABLE_V2,
        ],
        migration: Some(migrate_v1_to_v2),
    },
];
