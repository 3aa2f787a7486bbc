//! A [`Backend`] running carts on the wasmi interpreter.

use anyhow::anyhow;
use log::debug;
use wasmi::{Caller, Engine, Func, Instance, Linker, Memory, MemoryType, Module, Store};

use crate::{host::Fault, imports, memory::VirtualMemory, wasm4, Backend, Peripherals};

/// Data owned by the wasmi store and reachable from host functions.
struct CartridgeState {
    memory: Option<Memory>,
    peripherals: Peripherals,
}

pub struct WasmiBackend {
    instance: Instance,
    store: Store<CartridgeState>,
    memory: Memory,
    start: Option<Func>,
    update: Option<Func>,
}

impl WasmiBackend {
    /// Compile and instantiate a cart, linking it against a fresh memory page
    /// and the console's import table.
    pub fn new(bytes: &[u8], peripherals: Peripherals) -> anyhow::Result<Self> {
        let engine = Engine::default();
        let module =
            Module::new(&engine, bytes).map_err(|e| anyhow!("invalid cartridge module: {e}"))?;

        let mut store = Store::new(
            &engine,
            CartridgeState {
                memory: None,
                peripherals,
            },
        );

        let memory_type = MemoryType::new(wasm4::MEMORY_PAGES, Some(wasm4::MEMORY_PAGES))
            .map_err(|e| anyhow!("memory type: {e}"))?;
        let memory =
            Memory::new(&mut store, memory_type).map_err(|e| anyhow!("creating memory: {e}"))?;
        VirtualMemory::wrap(memory.data_mut(&mut store)).initialize();
        store.data_mut().memory = Some(memory);

        let mut linker = <Linker<CartridgeState>>::new(&engine);
        linker
            .define("env", "memory", memory)
            .map_err(|e| anyhow!("defining env.memory: {e}"))?;

        for (name, func) in import_table(&mut store) {
            linker
                .define("env", name, func)
                .map_err(|e| anyhow!("defining env.{name}: {e}"))?;
        }

        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|e| anyhow!("linking cartridge: {e}"))?
            .start(&mut store)
            .map_err(|e| anyhow!("running cartridge start section: {e}"))?;

        let start = instance.get_func(&store, "start");
        let update = instance.get_func(&store, "update");
        if start.is_none() {
            debug!("cartridge has no start export");
        }
        if update.is_none() {
            debug!("cartridge has no update export");
        }

        Ok(Self {
            instance,
            store,
            memory,
            start,
            update,
        })
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    fn call(&mut self, func: Option<Func>) -> Result<(), Fault> {
        match func {
            Some(func) => func.call(&mut self.store, &[], &mut []).map_err(fault),
            None => Ok(()),
        }
    }
}

impl Backend for WasmiBackend {
    fn call_start(&mut self) -> Result<(), Fault> {
        self.call(self.start)
    }

    fn call_update(&mut self) -> Result<(), Fault> {
        self.call(self.update)
    }

    fn memory(&self) -> VirtualMemory<&[u8]> {
        VirtualMemory::wrap(self.memory.data(&self.store))
    }

    fn hardware_mut(&mut self) -> (VirtualMemory<&mut [u8]>, &mut Peripherals) {
        let (page, state) = self.memory.data_and_store_mut(&mut self.store);
        (VirtualMemory::wrap(page), &mut state.peripherals)
    }
}

fn fault(err: wasmi::Error) -> Fault {
    match err {
        wasmi::Error::Trap(trap) => Fault::Trap {
            code: trap.trap_code().map(|code| format!("{code:?}")),
            message: trap.to_string(),
        },
        other => Fault::Runtime(other.to_string()),
    }
}

/// Run `f` against the caller's memory page and peripherals.
fn with_hardware<R: Default>(
    caller: &mut Caller<'_, CartridgeState>,
    f: impl FnOnce(&mut VirtualMemory<&mut [u8]>, &mut Peripherals) -> R,
) -> R {
    let Some(memory) = caller.data().memory else {
        return R::default();
    };
    let (page, state) = memory.data_and_store_mut(caller);
    f(&mut VirtualMemory::wrap(page), &mut state.peripherals)
}

fn import_table(store: &mut Store<CartridgeState>) -> [(&'static str, Func); 17] {
    [
        (
            "blit",
            Func::wrap(
                &mut *store,
                |mut caller: Caller<'_, CartridgeState>,
                 sprite: u32,
                 x: i32,
                 y: i32,
                 width: i32,
                 height: i32,
                 flags: u32| {
                    with_hardware(&mut caller, |mem, _| {
                        imports::blit(mem, sprite, x, y, width, height, flags)
                    })
                },
            ),
        ),
        (
            "blitSub",
            Func::wrap(
                &mut *store,
                |mut caller: Caller<'_, CartridgeState>,
                 sprite: u32,
                 x: i32,
                 y: i32,
                 width: i32,
                 height: i32,
                 src_x: u32,
                 src_y: u32,
                 stride: u32,
                 flags: u32| {
                    with_hardware(&mut caller, |mem, _| {
                        imports::blit_sub(
                            mem, sprite, x, y, width, height, src_x, src_y, stride, flags,
                        )
                    })
                },
            ),
        ),
        (
            "line",
            Func::wrap(
                &mut *store,
                |mut caller: Caller<'_, CartridgeState>, x1: i32, y1: i32, x2: i32, y2: i32| {
                    with_hardware(&mut caller, |mem, _| imports::line(mem, x1, y1, x2, y2))
                },
            ),
        ),
        (
            "hline",
            Func::wrap(
                &mut *store,
                |mut caller: Caller<'_, CartridgeState>, x: i32, y: i32, len: i32| {
                    with_hardware(&mut caller, |mem, _| imports::hline(mem, x, y, len))
                },
            ),
        ),
        (
            "vline",
            Func::wrap(
                &mut *store,
                |mut caller: Caller<'_, CartridgeState>, x: i32, y: i32, len: i32| {
                    with_hardware(&mut caller, |mem, _| imports::vline(mem, x, y, len))
                },
            ),
        ),
        (
            "oval",
            Func::wrap(
                &mut *store,
                |mut caller: Caller<'_, CartridgeState>, x: i32, y: i32, width: i32, height: i32| {
                    with_hardware(&mut caller, |mem, _| {
                        imports::oval(mem, x, y, width, height)
                    })
                },
            ),
        ),
        (
            "rect",
            Func::wrap(
                &mut *store,
                |mut caller: Caller<'_, CartridgeState>, x: i32, y: i32, width: i32, height: i32| {
                    with_hardware(&mut caller, |mem, _| {
                        imports::rect(mem, x, y, width, height)
                    })
                },
            ),
        ),
        (
            "text",
            Func::wrap(
                &mut *store,
                |mut caller: Caller<'_, CartridgeState>, ptr: u32, x: i32, y: i32| {
                    with_hardware(&mut caller, |mem, _| imports::text(mem, ptr, x, y))
                },
            ),
        ),
        (
            "textUtf8",
            Func::wrap(
                &mut *store,
                |mut caller: Caller<'_, CartridgeState>, ptr: u32, len: u32, x: i32, y: i32| {
                    with_hardware(&mut caller, |mem, _| {
                        imports::text_utf8(mem, ptr, len, x, y)
                    })
                },
            ),
        ),
        (
            "textUtf16",
            Func::wrap(
                &mut *store,
                |mut caller: Caller<'_, CartridgeState>, ptr: u32, len: u32, x: i32, y: i32| {
                    with_hardware(&mut caller, |mem, _| {
                        imports::text_utf16(mem, ptr, len, x, y)
                    })
                },
            ),
        ),
        (
            "tone",
            Func::wrap(
                &mut *store,
                |mut caller: Caller<'_, CartridgeState>,
                 frequency: u32,
                 duration: u32,
                 volume: u32,
                 flags: u32| {
                    imports::tone(
                        &mut caller.data_mut().peripherals,
                        frequency,
                        duration,
                        volume,
                        flags,
                    )
                },
            ),
        ),
        (
            "diskr",
            Func::wrap(
                &mut *store,
                |mut caller: Caller<'_, CartridgeState>, dest: u32, size: u32| -> u32 {
                    with_hardware(&mut caller, |mem, peripherals| {
                        imports::diskr(mem, peripherals, dest, size)
                    })
                },
            ),
        ),
        (
            "diskw",
            Func::wrap(
                &mut *store,
                |mut caller: Caller<'_, CartridgeState>, src: u32, size: u32| -> u32 {
                    with_hardware(&mut caller, |mem, peripherals| {
                        imports::diskw(mem, peripherals, src, size)
                    })
                },
            ),
        ),
        (
            "trace",
            Func::wrap(
                &mut *store,
                |mut caller: Caller<'_, CartridgeState>, ptr: u32| {
                    with_hardware(&mut caller, |mem, _| imports::trace(mem, ptr))
                },
            ),
        ),
        (
            "traceUtf8",
            Func::wrap(
                &mut *store,
                |mut caller: Caller<'_, CartridgeState>, ptr: u32, len: u32| {
                    with_hardware(&mut caller, |mem, _| imports::trace_utf8(mem, ptr, len))
                },
            ),
        ),
        (
            "traceUtf16",
            Func::wrap(
                &mut *store,
                |mut caller: Caller<'_, CartridgeState>, ptr: u32, len: u32| {
                    with_hardware(&mut caller, |mem, _| imports::trace_utf16(mem, ptr, len))
                },
            ),
        ),
        (
            "tracef",
            Func::wrap(
                &mut *store,
                |mut caller: Caller<'_, CartridgeState>, fmt: u32, args: u32| {
                    with_hardware(&mut caller, |mem, _| imports::tracef(mem, fmt, args))
                },
            ),
        ),
    ]
}
