//! The console itself: runs a cart frame by frame and shows the result.

use log::{error, info, warn};

use crate::{
    display::Display,
    framebuffer, imports,
    palette::{OutputPalette, PaletteCache},
    wasm4::{
        BUTTON_1, BUTTON_2, BUTTON_DOWN, BUTTON_LEFT, BUTTON_RIGHT, BUTTON_UP, GAMEPAD_COUNT,
        MOUSE_LEFT, MOUSE_MIDDLE, MOUSE_RIGHT, SCREEN_SIZE,
    },
    Backend,
};

pub mod overlay;

pub use overlay::OverlayStyle;

/// Why a cart stopped running.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Fault {
    /// The engine trapped while running guest code.
    #[error("trap ({}): {message}", .code.as_deref().unwrap_or("unknown"))]
    Trap {
        code: Option<String>,
        message: String,
    },
    /// Any other failure calling into the cart.
    #[error("{0}")]
    Runtime(String),
}

impl Fault {
    /// The overlay heading for this kind of fault.
    pub fn heading(&self) -> &'static str {
        match self {
            Self::Trap { .. } => "Execution error! (TRAP)",
            Self::Runtime(_) => "Runtime error!",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Trap { message, .. } => message,
            Self::Runtime(message) => message,
        }
    }
}

/// Misuse of the host by the embedder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("player slot {0} is out of range, the console has {GAMEPAD_COUNT}")]
    InvalidSlot(usize),
}

/// Settings for a [`ConsoleHost`].
#[derive(Clone, Debug)]
pub struct HostConfig {
    /// Display position of the screen's top-left pixel.
    pub display_offset: (u32, u32),
    /// Colors the display can show.
    pub output_palette: OutputPalette,
    /// Draw the last frame time in a strip above the screen.
    pub show_frame_time: bool,
    pub overlay: OverlayStyle,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            display_offset: (0, 0),
            output_palette: OutputPalette::default(),
            show_frame_time: false,
            overlay: OverlayStyle::default(),
        }
    }
}

/// Buttons held on one gamepad.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Gamepad {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub primary: bool,
    pub secondary: bool,
}

impl Gamepad {
    /// The gamepad register value.
    pub fn to_bits(self) -> u8 {
        [
            (self.primary, BUTTON_1),
            (self.secondary, BUTTON_2),
            (self.left, BUTTON_LEFT),
            (self.right, BUTTON_RIGHT),
            (self.up, BUTTON_UP),
            (self.down, BUTTON_DOWN),
        ]
        .into_iter()
        .filter(|(held, _)| *held)
        .fold(0, |bits, (_, bit)| bits | bit)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MouseButtons {
    pub left: bool,
    pub right: bool,
    pub middle: bool,
}

impl MouseButtons {
    pub fn to_bits(self) -> u8 {
        let mut bits = 0;
        if self.left {
            bits |= MOUSE_LEFT;
        }
        if self.right {
            bits |= MOUSE_RIGHT;
        }
        if self.middle {
            bits |= MOUSE_MIDDLE;
        }
        bits
    }
}

/// Only the first player drives the mouse.
const MOUSE_SLOT: usize = 0;

#[derive(Debug)]
enum HostState {
    Running,
    Faulted(Fault),
}

/// Runs a cart on a [`Backend`] and renders its screen onto a [`Display`].
///
/// Once the cart faults it is never called again; every following tick shows
/// the fault overlay instead.
pub struct ConsoleHost<B: Backend, D: Display> {
    backend: B,
    display: D,
    palette: PaletteCache<OutputPalette>,
    config: HostConfig,
    state: HostState,
    guest_inert: bool,
}

impl<B: Backend, D: Display> ConsoleHost<B, D> {
    pub fn new(backend: B, display: D, config: HostConfig) -> Self {
        Self {
            backend,
            display,
            palette: PaletteCache::new(config.output_palette.clone()),
            config,
            state: HostState::Running,
            guest_inert: false,
        }
    }

    /// Call the cart's `start` and show the screen it drew.
    ///
    /// A fault here is fatal: the cart's `update` will never run.
    pub fn start(&mut self) {
        if self.guest_inert {
            warn!("start called on an inert cartridge");
            return;
        }

        match self.backend.call_start() {
            Ok(()) => {
                info!("cartridge started");
                self.render();
            }
            Err(fault) => {
                self.guest_inert = true;
                self.enter_fault(fault);
                self.draw_fault();
            }
        }
    }

    /// Run one frame and flush the display.
    ///
    /// `elapsed_ms` is the time the previous frame took, shown when
    /// [`HostConfig::show_frame_time`] is set.
    pub fn tick(&mut self, elapsed_ms: u64) {
        match self.state {
            HostState::Faulted(_) => self.draw_fault(),
            HostState::Running => {
                if !self.backend.memory().preserve_framebuffer() {
                    framebuffer::clear(self.backend.memory_mut().framebuffer_mut());
                }

                if !self.guest_inert {
                    if let Err(fault) = self.backend.call_update() {
                        self.guest_inert = true;
                        self.enter_fault(fault);
                    }
                }

                self.render();
            }
        }

        if self.config.show_frame_time {
            overlay::draw_frame_time(
                &mut self.display,
                self.config.display_offset,
                elapsed_ms,
                &self.config.overlay,
            );
        }

        self.display.flush();
    }

    /// Set the buttons held on a player's gamepad.
    pub fn set_gamepad(&mut self, slot: usize, gamepad: Gamepad) -> Result<(), HostError> {
        if slot >= GAMEPAD_COUNT {
            return Err(HostError::InvalidSlot(slot));
        }
        self.backend.memory_mut().set_gamepad(slot, gamepad.to_bits());
        Ok(())
    }

    /// Release every button of a player who left.
    pub fn clear_gamepad(&mut self, slot: usize) -> Result<(), HostError> {
        self.set_gamepad(slot, Gamepad::default())
    }

    /// Move the mouse. Ignored for every slot but the first.
    pub fn set_mouse(&mut self, slot: usize, x: i16, y: i16) {
        if slot == MOUSE_SLOT {
            self.backend.memory_mut().set_mouse_position(x, y);
        }
    }

    /// Set the held mouse buttons. Ignored for every slot but the first.
    pub fn set_mouse_buttons(&mut self, slot: usize, buttons: MouseButtons) {
        if slot == MOUSE_SLOT {
            self.backend.memory_mut().set_mouse_buttons(buttons.to_bits());
        }
    }

    /// Load saved data into cart memory at `addr`. Returns the bytes read.
    pub fn save_read(&mut self, addr: u32, size: u32) -> u32 {
        let (mut mem, peripherals) = self.backend.hardware_mut();
        imports::diskr(&mut mem, peripherals, addr, size)
    }

    /// Save cart memory at `addr`. Returns the bytes written.
    pub fn save_write(&mut self, addr: u32, size: u32) -> u32 {
        let (mut mem, peripherals) = self.backend.hardware_mut();
        imports::diskw(&mut mem, peripherals, addr, size)
    }

    pub fn fault(&self) -> Option<&Fault> {
        match &self.state {
            HostState::Faulted(fault) => Some(fault),
            HostState::Running => None,
        }
    }

    pub fn is_faulted(&self) -> bool {
        self.fault().is_some()
    }

    /// Leave the faulted state and stop showing the overlay. A cart that
    /// faulted stays inert.
    pub fn clear_fault(&mut self) {
        if let HostState::Faulted(fault) = &self.state {
            info!("clearing fault: {fault}");
            self.state = HostState::Running;
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    pub fn palette(&self) -> &PaletteCache<OutputPalette> {
        &self.palette
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    fn enter_fault(&mut self, fault: Fault) {
        error!("cartridge faulted: {fault}");
        self.state = HostState::Faulted(fault);
    }

    fn draw_fault(&mut self) {
        if let HostState::Faulted(fault) = &self.state {
            overlay::draw_fault(
                &mut self.display,
                self.config.display_offset,
                fault,
                &self.config.overlay,
            );
        }
    }

    /// Copy the framebuffer through the palette onto the display.
    fn render(&mut self) {
        let memory = self.backend.memory();
        self.palette.update(&memory);

        let (offset_x, offset_y) = self.config.display_offset;
        for (n, byte) in memory.framebuffer().iter().enumerate() {
            for p in 0..4 {
                let index = n * 4 + p;
                let color = (byte >> (6 - p * 2)) & 0x3;
                let x = (index % SCREEN_SIZE as usize) as u32;
                let y = (index / SCREEN_SIZE as usize) as u32;
                let (Some(color), Some(px), Some(py)) = (
                    self.palette.get_color(color as usize),
                    offset_x.checked_add(x),
                    offset_y.checked_add(y),
                ) else {
                    continue;
                };
                self.display.set_pixel(px, py, color);
            }
        }
    }
}

impl<B: Backend, D: Display> std::fmt::Debug for ConsoleHost<B, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleHost")
            .field("state", &self.state)
            .field("guest_inert", &self.guest_inert)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{
        display::Canvas,
        memory::VirtualMemory,
        palette::OutputColor,
        save::MemorySave,
        wasm4::{
            DRAW_COLORS_ADDR, GAMEPAD1_ADDR, MOUSE_BUTTONS_ADDR,
            SYSTEM_FLAGS_ADDR, SYSTEM_PRESERVE_FRAMEBUFFER,
        },
        Peripherals,
    };

    type Script = fn(&mut VirtualMemory<&mut [u8]>, usize) -> Result<(), Fault>;

    /// Runs `script` as the cart's `update`, with the call number.
    struct ScriptedBackend {
        memory: VirtualMemory<Vec<u8>>,
        peripherals: Peripherals,
        start_fault: Option<Fault>,
        script: Script,
        updates: usize,
    }

    impl ScriptedBackend {
        fn new(script: Script) -> Self {
            Self {
                memory: VirtualMemory::new(1),
                peripherals: Peripherals::default(),
                start_fault: None,
                script,
                updates: 0,
            }
        }
    }

    impl Backend for ScriptedBackend {
        fn call_start(&mut self) -> Result<(), Fault> {
            match self.start_fault.clone() {
                Some(fault) => Err(fault),
                None => Ok(()),
            }
        }

        fn call_update(&mut self) -> Result<(), Fault> {
            self.updates += 1;
            let updates = self.updates;
            let script = self.script;
            script(&mut self.memory_mut(), updates)
        }

        fn memory(&self) -> VirtualMemory<&[u8]> {
            VirtualMemory::wrap(self.memory.as_bytes())
        }

        fn hardware_mut(&mut self) -> (VirtualMemory<&mut [u8]>, &mut Peripherals) {
            (
                VirtualMemory::wrap(self.memory.as_bytes_mut()),
                &mut self.peripherals,
            )
        }
    }

    fn console(backend: ScriptedBackend) -> ConsoleHost<ScriptedBackend, Canvas> {
        let config = HostConfig {
            display_offset: (4, 30),
            ..Default::default()
        };
        ConsoleHost::new(backend, Canvas::new(200, 200), config)
    }

    fn screen_pixel(host: &ConsoleHost<ScriptedBackend, Canvas>, x: u32, y: u32) -> OutputColor {
        host.display().get(4 + x, 30 + y).unwrap()
    }

    fn trap() -> Fault {
        Fault::Trap {
            code: Some("UnreachableCodeReached".to_string()),
            message: "wasm trap: unreachable".to_string(),
        }
    }

    const LIGHT: OutputColor = OutputColor(7);
    const GREEN: OutputColor = OutputColor(11);
    const PANEL: OutputColor = OutputColor(12);

    #[test]
    fn fault_on_fifth_tick() {
        let mut host = console(ScriptedBackend::new(|mem, n| {
            imports::rect(mem, 10, 10, 20, 20);
            if n == 5 {
                Err(trap())
            } else {
                Ok(())
            }
        }));
        host.start();

        for _ in 0..4 {
            host.tick(16);
        }
        assert!(!host.is_faulted());

        // the fifth frame is still shown
        host.display_mut().set_pixel(4 + 15, 30 + 15, OutputColor(0));
        host.tick(16);
        assert_eq!(host.fault(), Some(&trap()));
        assert_eq!(host.display().flushes(), 5);
        assert_eq!(screen_pixel(&host, 15, 15), GREEN);

        host.tick(16);
        host.tick(16);
        assert_eq!(host.backend().updates, 5);
        assert_eq!(host.display().flushes(), 7);
        assert_eq!(screen_pixel(&host, 27, 11), PANEL);
        assert_eq!(screen_pixel(&host, 0, 63), PANEL);
        // outside the overlay the last frame remains
        assert_eq!(screen_pixel(&host, 15, 50), LIGHT);
    }

    #[test]
    fn failed_start_is_fatal() {
        let mut backend = ScriptedBackend::new(|mem, _| {
            imports::rect(mem, 0, 0, 160, 160);
            Ok(())
        });
        backend.start_fault = Some(Fault::Runtime("start exploded".to_string()));
        let mut host = console(backend);

        host.start();
        assert!(host.is_faulted());
        assert_eq!(screen_pixel(&host, 0, 63), PANEL);
        assert_eq!(host.display().flushes(), 0);

        host.tick(16);
        host.clear_fault();
        assert!(!host.is_faulted());
        host.tick(16);

        assert_eq!(host.backend().updates, 0);
        assert_eq!(host.display().flushes(), 2);
        assert_eq!(screen_pixel(&host, 0, 63), LIGHT);

        // starting again does not revive the cart
        host.start();
        assert!(!host.is_faulted());
    }

    #[test]
    fn start_renders_once() {
        let mut backend = ScriptedBackend::new(|_, _| Ok(()));
        backend.memory.framebuffer_mut()[0] = 0b1100_0000;
        let mut host = console(backend);

        host.start();
        assert_eq!(screen_pixel(&host, 0, 0), OutputColor(1));
        assert_eq!(screen_pixel(&host, 1, 0), LIGHT);
        assert_eq!(host.palette().get_color(3), Some(OutputColor(1)));
        assert_eq!(host.display().flushes(), 0);
    }

    #[test]
    fn framebuffer_cleared_unless_preserved() {
        let draw_first_frame: Script = |mem, n| {
            if n == 1 {
                mem.write_u16(DRAW_COLORS_ADDR, 0x4);
                imports::hline(mem, 0, 0, 4);
            }
            Ok(())
        };

        let mut host = console(ScriptedBackend::new(draw_first_frame));
        host.tick(16);
        host.tick(16);
        assert_eq!(host.backend().memory().framebuffer()[0], 0);
        assert_eq!(screen_pixel(&host, 0, 0), LIGHT);

        let mut backend = ScriptedBackend::new(draw_first_frame);
        backend
            .memory
            .write_u8(SYSTEM_FLAGS_ADDR, SYSTEM_PRESERVE_FRAMEBUFFER);
        let mut host = console(backend);
        host.tick(16);
        host.tick(16);
        assert_eq!(host.backend().memory().framebuffer()[0], 0xff);
        assert_eq!(screen_pixel(&host, 3, 0), OutputColor(1));
    }

    #[test]
    fn gamepads_are_independent() {
        let mut host = console(ScriptedBackend::new(|_, _| Ok(())));
        let pads = [
            Gamepad {
                up: true,
                ..Default::default()
            },
            Gamepad {
                primary: true,
                left: true,
                ..Default::default()
            },
            Gamepad::default(),
            Gamepad {
                down: true,
                right: true,
                secondary: true,
                ..Default::default()
            },
        ];
        for (slot, pad) in pads.iter().enumerate() {
            host.set_gamepad(slot, *pad).unwrap();
        }

        let memory = host.backend().memory();
        assert_eq!(
            memory.slice(GAMEPAD1_ADDR, 4),
            &[BUTTON_UP, BUTTON_1 | BUTTON_LEFT, 0, BUTTON_DOWN | BUTTON_RIGHT | BUTTON_2]
        );

        host.clear_gamepad(1).unwrap();
        assert_eq!(
            host.backend().memory().slice(GAMEPAD1_ADDR, 4),
            &[BUTTON_UP, 0, 0, BUTTON_DOWN | BUTTON_RIGHT | BUTTON_2]
        );

        assert_eq!(
            host.set_gamepad(4, Gamepad::default()),
            Err(HostError::InvalidSlot(4))
        );
    }

    #[test]
    fn mouse_follows_first_player() {
        let mut host = console(ScriptedBackend::new(|_, _| Ok(())));
        host.set_mouse(0, 12, -3);
        host.set_mouse_buttons(
            0,
            MouseButtons {
                left: true,
                middle: true,
                ..Default::default()
            },
        );
        host.set_mouse(2, 99, 99);
        host.set_mouse_buttons(
            1,
            MouseButtons {
                right: true,
                ..Default::default()
            },
        );

        let memory = host.backend().memory();
        assert_eq!(memory.mouse_position(), (12, -3));
        assert_eq!(memory.read_u8(MOUSE_BUTTONS_ADDR), MOUSE_LEFT | MOUSE_MIDDLE);
    }

    #[test]
    fn save_round_trip() {
        let save = Arc::new(Mutex::new(MemorySave::new()));
        let mut backend = ScriptedBackend::new(|_, _| Ok(()));
        backend.peripherals.save = Box::new(Arc::clone(&save));
        backend.memory.write_bytes(0x1000, b"high score");
        let mut host = console(backend);

        assert_eq!(host.save_write(0x1000, 10), 10);
        assert_eq!(host.save_read(0x2000, 10), 10);
        assert_eq!(host.backend().memory().slice(0x2000, 10), b"high score");

        save.lock().unwrap().set_available(false);
        assert_eq!(host.save_read(0x3000, 10), 0);
        assert_eq!(host.save_write(0x1000, 10), 0);
    }

    #[test]
    fn frame_time_label() {
        let backend = ScriptedBackend::new(|_, _| Ok(()));
        let config = HostConfig {
            display_offset: (0, 20),
            show_frame_time: true,
            ..Default::default()
        };
        let mut host = ConsoleHost::new(backend, Canvas::new(160, 180), config);
        host.tick(17);

        let label_pixels = (0..80)
            .flat_map(|x| (2..12).map(move |y| (x, y)))
            .filter(|(x, y)| host.display().get(*x, *y) == Some(OutputColor(7)))
            .count();
        assert!(label_pixels > 0);
        assert_eq!(host.display().get(0, 20), Some(LIGHT));
    }

    #[test]
    fn display_offset_near_u32_max() {
        let config = HostConfig {
            display_offset: (u32::MAX - 10, u32::MAX),
            show_frame_time: true,
            ..Default::default()
        };
        let mut host = ConsoleHost::new(
            ScriptedBackend::new(|mem, _| {
                imports::rect(mem, 0, 0, 160, 160);
                Ok(())
            }),
            Canvas::new(16, 16),
            config,
        );

        host.start();
        host.tick(16);
        assert_eq!(host.display().flushes(), 1);
        assert!(host.display().pixels().iter().all(|c| *c == OutputColor(0)));
    }

    #[test]
    fn fault_messages() {
        assert_eq!(trap().heading(), "Execution error! (TRAP)");
        assert_eq!(trap().message(), "wasm trap: unreachable");
        assert_eq!(
            trap().to_string(),
            "trap (UnreachableCodeReached): wasm trap: unreachable"
        );
        let fault = Fault::Runtime("bad signature".to_string());
        assert_eq!(fault.heading(), "Runtime error!");
        assert_eq!(fault.to_string(), "bad signature");
    }

    #[test]
    fn gamepad_bits() {
        let all = Gamepad {
            up: true,
            down: true,
            left: true,
            right: true,
            primary: true,
            secondary: true,
        };
        assert_eq!(all.to_bits(), 0b1111_0011);
        assert_eq!(Gamepad::default().to_bits(), 0);
    }
}
