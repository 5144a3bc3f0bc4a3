// Aulos
// Copyright (c) 2026 The Project Aulos Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `opcodes` module describes the host-facing opcode surface.
//!
//! Each entry names one opcode, its output and input signatures in the host's type letters
//! (`i` init-scalar, `a` audio buffer, `x` scalar or audio, `S` string, `o` optional
//! defaulting to zero), and whether it runs at init time only or splits into init and perf
//! halves. The registration glue itself belongs to the host; this table is what it registers.
//!
//! | Opcode | Engine API |
//! |--------|------------|
//! | `sfload` | [`Engine::load`](crate::Engine::load) |
//! | `sfpreset` | [`Engine::assign_preset`](crate::Engine::assign_preset) |
//! | `sfpassign` | [`Engine::assign_all_presets`](crate::Engine::assign_all_presets) |
//! | `sfplist`, `sfilist` | [`Engine::log_preset_list`](crate::Engine::log_preset_list), [`Engine::log_instrument_list`](crate::Engine::log_instrument_list) |
//! | `sfplay`(`3`) | [`Engine::preset_voice`](crate::Engine::preset_voice) + [`Voice::render_stereo`](crate::Voice::render_stereo) |
//! | `sfplaym`(`3m`) | [`Engine::preset_voice`](crate::Engine::preset_voice) + [`Voice::render_mono`](crate::Voice::render_mono) |
//! | `sfinstr`(`3`) | [`Engine::instrument_voice`](crate::Engine::instrument_voice) + [`Voice::render_stereo`](crate::Voice::render_stereo) |
//! | `sfinstrm`(`3m`) | [`Engine::instrument_voice`](crate::Engine::instrument_voice) + [`Voice::render_mono`](crate::Voice::render_mono) |
//!
//! The `3` suffix selects the [`Cubic`](crate::Cubic) interpolator; its absence selects
//! [`Linear`](crate::Linear).

/// When an opcode's work runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Init time only.
    Init,
    /// An init half that sets the voice up and a perf half called once per block.
    InitPerf,
}

/// One entry of the opcode surface.
#[derive(Clone, Copy, Debug)]
pub struct OpcodeDesc {
    pub name: &'static str,
    pub outputs: &'static str,
    pub inputs: &'static str,
    pub dispatch: Dispatch,
}

/// The opcode surface, in registration order.
pub const OPCODES: &[OpcodeDesc] = &[
    OpcodeDesc { name: "sfload", outputs: "i", inputs: "S", dispatch: Dispatch::Init },
    OpcodeDesc { name: "sfpreset", outputs: "i", inputs: "iiii", dispatch: Dispatch::Init },
    OpcodeDesc { name: "sfplay", outputs: "aa", inputs: "iixxioo", dispatch: Dispatch::InitPerf },
    OpcodeDesc { name: "sfplaym", outputs: "a", inputs: "iixxioo", dispatch: Dispatch::InitPerf },
    OpcodeDesc { name: "sfplist", outputs: "", inputs: "i", dispatch: Dispatch::Init },
    OpcodeDesc { name: "sfilist", outputs: "", inputs: "i", dispatch: Dispatch::Init },
    OpcodeDesc { name: "sfpassign", outputs: "", inputs: "ii", dispatch: Dispatch::Init },
    OpcodeDesc {
        name: "sfinstrm",
        outputs: "a",
        inputs: "iixxiioo",
        dispatch: Dispatch::InitPerf,
    },
    OpcodeDesc {
        name: "sfinstr",
        outputs: "aa",
        inputs: "iixxiioo",
        dispatch: Dispatch::InitPerf,
    },
    OpcodeDesc { name: "sfplay3", outputs: "aa", inputs: "iixxioo", dispatch: Dispatch::InitPerf },
    OpcodeDesc { name: "sfplay3m", outputs: "a", inputs: "iixxioo", dispatch: Dispatch::InitPerf },
    OpcodeDesc {
        name: "sfinstr3",
        outputs: "aa",
        inputs: "iixxiioo",
        dispatch: Dispatch::InitPerf,
    },
    OpcodeDesc {
        name: "sfinstr3m",
        outputs: "a",
        inputs: "iixxiioo",
        dispatch: Dispatch::InitPerf,
    },
];

/// Finds an opcode descriptor by name.
pub fn lookup(name: &str) -> Option<&'static OpcodeDesc> {
    OPCODES.iter().find(|desc| desc.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_lookup() {
        assert_eq!(lookup("sfplay3").unwrap().outputs, "aa");
        assert_eq!(lookup("sfplaym").unwrap().outputs, "a");
        assert_eq!(lookup("sfload").unwrap().dispatch, Dispatch::Init);
        assert!(lookup("sfwrite").is_none());
    }

    #[test]
    fn verify_cubic_variants_share_signatures() {
        for (plain, cubic) in
            [("sfplay", "sfplay3"), ("sfplaym", "sfplay3m"), ("sfinstr", "sfinstr3")]
        {
            let plain = lookup(plain).unwrap();
            let cubic = lookup(cubic).unwrap();

            assert_eq!(plain.outputs, cubic.outputs);
            assert_eq!(plain.inputs, cubic.inputs);
        }
    }
}
