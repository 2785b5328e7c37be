//! Building report analysis.
//!
//! Reads technical reports laid out as
//! `<data>/<city>/<category>/<type>/<building>/تقارير/*.pdf`, extracts each
//! building's condition with the model, asks for improvement suggestions,
//! and writes:
//!
//! | File | Rows |
//! |------|------|
//! | `building_data/buildings.csv` (+ `buildings_detailed.json`) | one per building |
//! | `ai_suggestions/suggestions.csv` (+ `suggestions_detailed.json`) | one per suggestion |
//! | `building_images/<building_id>/` | the report's images |
//!
//! [`building_status`] summarizes those directories without touching the
//! model.

pub mod analyst;
pub mod fields;
pub mod run;
pub mod scan;
pub mod status;

pub use analyst::{parse_suggestions, BuildingAnalyst};
pub use fields::{building_info_schema, suggestion_schema, BuildingContext};
pub use run::{run_buildings, run_buildings_sync, BuildingOutput, BuildingResult, BuildingStats};
pub use scan::{scan_data_dir, BuildingSource, REPORTS_DIR};
pub use status::{building_status, BuildingStatus, StatusFile};
