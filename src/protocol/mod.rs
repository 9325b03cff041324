// SPDX-License-Identifier: GPL-3.0-or-later

pub mod frame;
pub mod command;
pub mod dispatcher;
pub mod reply;

pub use dispatcher::Dispatcher;
pub use frame::FrameCodec;
