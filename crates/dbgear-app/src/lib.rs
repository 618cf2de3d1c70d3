// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod backend;
pub mod cancel;
pub mod forms;
pub mod grid;
pub mod ids;
pub mod model;
pub mod notice;
pub mod route;
pub mod schema;
pub mod settings;
pub mod state;

pub use backend::*;
pub use cancel::*;
pub use forms::*;
pub use grid::*;
pub use ids::*;
pub use model::*;
pub use notice::*;
pub use route::*;
pub use schema::*;
pub use settings::*;
pub use state::*;
