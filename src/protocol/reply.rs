// SPDX-License-Identifier: GPL-3.0-or-later

// Reply formatting: every outbound frame is CRLF-terminated ASCII built
// with `core::fmt::Write` over a fixed-capacity `heapless::String`, the
// same no-alloc formatting idiom the teacher uses for its RTT debug
// strings.

use core::fmt::Write;
use heapless::String;

use crate::drivers::gripper::GripperState;
use crate::drivers::motion::{LimitMask, Side};

pub const REPLY_BUFFER_LEN: usize = 96;

pub type ReplyString = String<REPLY_BUFFER_LEN>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorTag {
    InvalidParams,
    Bounds,
    InvalidServoNum,
    UnknownCmd,
    Busy,
}

impl ErrorTag {
    fn as_str(self) -> &'static str {
        match self {
            ErrorTag::InvalidParams => "INVALID_PARAMS",
            ErrorTag::Bounds => "BOUNDS",
            ErrorTag::InvalidServoNum => "INVALID_SERVO_NUM",
            ErrorTag::UnknownCmd => "UNKNOWN_CMD",
            ErrorTag::Busy => "BUSY",
        }
    }
}

fn side_name(side: Side) -> &'static str {
    match side {
        Side::HMin => "H_MIN",
        Side::HMax => "H_MAX",
        Side::VMin => "V_MIN",
        Side::VMax => "V_MAX",
    }
}

fn render(f: impl FnOnce(&mut ReplyString) -> core::fmt::Result) -> ReplyString {
    let mut s = ReplyString::new();
    let _ = f(&mut s);
    let _ = s.push_str("\r\n");
    s
}

pub fn ok(verb: &str) -> ReplyString {
    render(|s| write!(s, "OK:{}", verb))
}

pub fn ok_args(verb: &str, args: impl core::fmt::Display) -> ReplyString {
    render(|s| write!(s, "OK:{}:{}", verb, args))
}

pub fn err(tag: ErrorTag) -> ReplyString {
    render(|s| write!(s, "ERR:{}", tag.as_str()))
}

pub fn err_detail(tag: ErrorTag, detail: impl core::fmt::Display) -> ReplyString {
    render(|s| write!(s, "ERR:{}:{}", tag.as_str(), detail))
}

pub fn move_started(h_steps: i32, v_steps: i32) -> ReplyString {
    render(|s| write!(s, "STEPPER_MOVE_STARTED:{},{}", h_steps, v_steps))
}

pub fn move_completed(h_steps: i32, v_steps: i32) -> ReplyString {
    render(|s| write!(s, "STEPPER_MOVE_COMPLETED:{},{}", h_steps, v_steps))
}

pub fn limit_triggered(side: Side) -> ReplyString {
    render(|s| write!(s, "LIMIT_{}_TRIGGERED", side_name(side)))
}

pub fn position_at_limit(h: i32, v: i32) -> ReplyString {
    render(|s| write!(s, "POSITION_AT_LIMIT:H={},V={}", h, v))
}

pub fn limit_mask(mask: LimitMask) -> ReplyString {
    render(|s| {
        write!(
            s,
            "OK:L:{},{},{},{}",
            mask.h_min as u8, mask.h_max as u8, mask.v_min as u8, mask.v_max as u8
        )
    })
}

pub fn servo_angles(angle1: u16, angle2: u16) -> ReplyString {
    render(|s| write!(s, "OK:Q:{},{}", angle1, angle2))
}

pub fn gripper_state(state: GripperState, position: u32) -> ReplyString {
    let name = match state {
        GripperState::Open => "OPEN",
        GripperState::Closed => "CLOSED",
        GripperState::Moving => "MOVING",
    };
    render(|s| write!(s, "OK:G?:{},{}", name, position))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replies_are_crlf_terminated() {
        assert!(ok("S").ends_with("\r\n"));
        assert!(err(ErrorTag::Bounds).ends_with("\r\n"));
    }

    #[test]
    fn replies_never_contain_frame_delimiters() {
        let samples = [
            ok("S"),
            err(ErrorTag::UnknownCmd),
            move_started(100, -50),
            move_completed(100, -50),
            limit_triggered(Side::HMax),
            position_at_limit(1234, 0),
        ];
        for s in samples.iter() {
            assert!(!s.contains('<'));
            assert!(!s.contains('>'));
        }
    }

    #[test]
    fn error_tag_renders_exact_string() {
        assert_eq!(err(ErrorTag::InvalidParams).as_str(), "ERR:INVALID_PARAMS\r\n");
    }

    #[test]
    fn move_events_carry_signed_step_counts() {
        assert_eq!(move_started(4000, 0).as_str(), "STEPPER_MOVE_STARTED:4000,0\r\n");
        assert_eq!(move_completed(-12, 34).as_str(), "STEPPER_MOVE_COMPLETED:-12,34\r\n");
    }
}
