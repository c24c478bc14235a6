//! Property-based tests for the bitbang window.
//!
//! Any sequence of enable/write/disable calls is replayed against a
//! simulated FT232R and checked against a two-state model: writes succeed
//! only between a successful enable and the next disable.

use ftdi_session::constants::pid;
use ftdi_session::transport::{MockBus, MockDevice};
use ftdi_session::{BitMode, DeviceContext, ErrorKind, SessionState, FTDI_VID};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Op {
    Enable(u8),
    Write(u8),
    Disable,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<u8>().prop_map(Op::Enable),
        any::<u8>().prop_map(Op::Write),
        Just(Op::Disable),
    ]
}

proptest! {
    #[test]
    fn writes_only_inside_enable_window(ops in prop::collection::vec(op_strategy(), 0..24)) {
        let bus = MockBus::new();
        let id = bus.attach(MockDevice::ft232r("PROP"));
        let mut ctx = DeviceContext::create(bus.clone()).unwrap();
        ctx.open(FTDI_VID, pid::FT232).unwrap();

        let mut enabled = false;
        let mut expected_written = Vec::new();
        for op in ops {
            match op {
                Op::Enable(mask) => {
                    let result = ctx.enable_bitbang(mask);
                    prop_assert_eq!(result.is_ok(), !enabled, "enable with enabled={}", enabled);
                    if let Err(e) = result {
                        prop_assert_eq!(e.kind(), ErrorKind::InvalidState);
                    }
                    enabled = true;
                }
                Op::Write(frame) => {
                    let result = ctx.write_bitbang(frame);
                    if enabled {
                        prop_assert_eq!(result.unwrap(), 1);
                        expected_written.push(frame);
                    } else {
                        prop_assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidState);
                    }
                }
                Op::Disable => {
                    let result = ctx.disable_bitbang();
                    prop_assert_eq!(result.is_ok(), enabled, "disable with enabled={}", enabled);
                    enabled = false;
                }
            }

            let expected_mode = if enabled { BitMode::BitBang } else { BitMode::Reset };
            prop_assert_eq!(ctx.state(), SessionState::Open(expected_mode));
        }

        prop_assert_eq!(bus.written(id), expected_written);
        ctx.close().unwrap();
    }
}
