// SPDX-License-Identifier: GPL-3.0-or-later

pub mod distance;
pub mod profile;
pub mod axis;
pub mod coordinator;
pub mod limit;

pub use distance::{AxisId, Steps};
pub use axis::{Axis, AxisState, GangedOutputs, StepDriver};
pub use coordinator::{Coordinator, MoveOutcome};
pub use limit::{Direction, LimitEvent, LimitMask, LimitSupervisor, Side};
pub use profile::{MotionProfile, ProfileState};
