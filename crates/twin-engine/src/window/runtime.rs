use anyhow::{Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::core::{App as CoreApp, AppControl, FrameCtx, SetupCtx};
use crate::driver::{DriverConfig, FrameDriver, FrameOutcome};
use crate::gpu::{GpuInit, MirrorOutcome, SurfaceErrorAction, WgpuBackend};
use crate::loader::{AsyncLoader, LoaderConfig, LoaderHandle};
use crate::scene::SceneTree;

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    /// Size of the mirror window.
    pub initial_size: LogicalSize<f64>,
    pub driver: DriverConfig,
    pub loader: LoaderConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "twin".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
            driver: DriverConfig::default(),
            loader: LoaderConfig::default(),
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Runs `app` until the session quits, the window closes or a fatal
    /// error occurs. The scene is shut down before the GPU goes away.
    pub fn run<A>(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Result<()>
    where
        A: 'static + CoreApp,
    {
        let loader = AsyncLoader::new(config.loader.clone()).context("failed to start the async loader")?;
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, gpu_init, app, loader);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        state.teardown();
        match state.failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[self_referencing]
struct Stage {
    window: Window,

    #[borrows(window)]
    #[covariant]
    gpu: WgpuBackend<'this>,
}

/// Everything that exists only while the window does.
struct Running {
    stage: Stage,
    driver: FrameDriver,
    last_outcome: Option<FrameOutcome>,
}

struct AppState<A>
where
    A: CoreApp + 'static,
{
    config: RuntimeConfig,
    gpu_init: GpuInit,
    app: A,

    running: Option<Running>,
    exit_requested: bool,
    failure: Option<anyhow::Error>,

    tree: SceneTree,
    loader_handle: LoaderHandle,
    // Dropped after `running`; joins the workers.
    _loader: AsyncLoader,
}

impl<A> AppState<A>
where
    A: CoreApp + 'static,
{
    fn new(config: RuntimeConfig, gpu_init: GpuInit, app: A, loader: AsyncLoader) -> Self {
        Self {
            config,
            gpu_init,
            app,
            running: None,
            exit_requested: false,
            failure: None,
            tree: SceneTree::new(),
            loader_handle: loader.handle(),
            _loader: loader,
        }
    }

    fn fail(&mut self, err: anyhow::Error) {
        log::error!("{err:#}");
        self.failure.get_or_insert(err);
        self.exit_requested = true;
    }

    fn launch(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let gpu_init = self.gpu_init.clone();
        let mut stage = StageTryBuilder {
            window,
            gpu_builder: |w| pollster::block_on(WgpuBackend::new(w, gpu_init)),
        }
        .try_build()
        .context("GPU initialization failed for the mirror window")?;

        let session = self.app.session().context("failed to open the HMD session")?;
        let mut driver = FrameDriver::new(session, self.config.driver.clone());

        {
            let mut ctx = SetupCtx {
                window: stage.borrow_window(),
                tree: &mut self.tree,
                loader: &self.loader_handle,
                driver: &mut driver,
            };
            self.app.setup(&mut ctx).context("application setup failed")?;
        }

        let (tree, loader) = (&mut self.tree, &self.loader_handle);
        let started = stage.with_gpu_mut(|gpu| driver.start(gpu, tree, loader));
        if let Err(err) = started {
            // Nodes may hold GPU resources from a partial start.
            stage.with_gpu_mut(|gpu| driver.shutdown(gpu, tree, loader));
            return Err(err).context("frame driver failed to start");
        }

        stage.with_window(|w| w.request_redraw());
        self.running = Some(Running {
            stage,
            driver,
            last_outcome: None,
        });
        Ok(())
    }

    /// Shuts the scene down while the GPU is still alive. Safe to call more
    /// than once.
    fn teardown(&mut self) {
        let Some(mut running) = self.running.take() else {
            return;
        };
        let (tree, loader) = (&mut self.tree, &self.loader_handle);
        let driver = &mut running.driver;
        running.stage.with_gpu_mut(|gpu| driver.shutdown(gpu, tree, loader));
    }

    fn redraw(&mut self) {
        let Some(running) = self.running.as_mut() else {
            return;
        };

        let control = {
            let mut ctx = FrameCtx {
                window: running.stage.borrow_window(),
                tree: &mut self.tree,
                loader: &self.loader_handle,
                driver: &mut running.driver,
                last_outcome: running.last_outcome,
            };
            self.app.on_frame(&mut ctx)
        };
        if control == AppControl::Exit {
            self.exit_requested = true;
            return;
        }

        let (tree, loader) = (&mut self.tree, &self.loader_handle);
        let driver = &mut running.driver;
        let outcome = match running.stage.with_gpu_mut(|gpu| driver.frame(gpu, tree, loader)) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.fail(anyhow::Error::new(err).context("frame failed"));
                return;
            }
        };
        running.last_outcome = Some(outcome);

        if outcome == FrameOutcome::Quit {
            self.exit_requested = true;
            return;
        }

        let images = running.driver.presented_images();
        running.stage.with_window(|w| w.pre_present_notify());
        let mirror = running.stage.with_gpu_mut(|gpu| gpu.present_mirror(images));
        if mirror == MirrorOutcome::Surface(SurfaceErrorAction::Fatal) {
            self.fail(anyhow::anyhow!("mirror surface is out of memory"));
            return;
        }

        running.stage.with_window(|w| w.request_redraw());
    }
}

impl<A> ApplicationHandler for AppState<A>
where
    A: CoreApp + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() || self.exit_requested {
            return;
        }

        if let Err(err) = self.launch(event_loop) {
            self.fail(err);
            event_loop.exit();
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            self.teardown();
            event_loop.exit();
            return;
        }

        // The compositor paces frames; never sleep between them.
        event_loop.set_control_flow(ControlFlow::Poll);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.exit_requested {
            self.teardown();
            event_loop.exit();
            return;
        }

        let Some(running) = self.running.as_mut() else {
            return;
        };
        if running.stage.borrow_window().id() != window_id {
            return;
        }

        if self.app.on_window_event(&event) == AppControl::Exit {
            self.exit_requested = true;
        }

        match &event {
            WindowEvent::CloseRequested => {
                self.exit_requested = true;
            }

            WindowEvent::Resized(new_size) => {
                running.stage.with_gpu_mut(|gpu| gpu.resize(*new_size));
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                let new_size = running.stage.borrow_window().inner_size();
                running.stage.with_gpu_mut(|gpu| gpu.resize(new_size));
            }

            WindowEvent::RedrawRequested if !self.exit_requested => self.redraw(),

            _ => {}
        }

        if self.exit_requested {
            self.teardown();
            event_loop.exit();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.teardown();
    }
}
