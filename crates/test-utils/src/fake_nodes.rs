use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use nodeforge::dag::{PinDescriptor, PinLayout};
use nodeforge::errors::BuildError;
use nodeforge::exec::{BuildContext, BuildJob, ImageBuffer, NodeImplementation, OutputSlots};
use nodeforge::types::{DataType, Generation};

/// Something a fake node did, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `make_build_job` was called; `inputs` is how many upstream outputs
    /// were resolved for it.
    JobCreated { node: String, inputs: usize },
    Completed(String),
    Failed(String),
    Cleanup(String),
}

/// Shared, ordered log of [`Event`]s across every fake node of a graph.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: Event) {
        self.0.lock().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().clone()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }

    /// Names of nodes whose job was created, in order.
    pub fn created(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::JobCreated { node, .. } => Some(node),
                _ => None,
            })
            .collect()
    }

    /// Names of nodes whose job completed, in order.
    pub fn completed(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Completed(node) => Some(node),
                _ => None,
            })
            .collect()
    }

    pub fn failed(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Failed(node) => Some(node),
                _ => None,
            })
            .collect()
    }

    pub fn cleanups(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Cleanup(node) => Some(node),
                _ => None,
            })
            .collect()
    }

    /// Position of the first event equal to `event`.
    pub fn position(&self, event: &Event) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }
}

/// A latch that work items block on until a test opens it.
#[derive(Debug, Default)]
pub struct Gate {
    state: Mutex<GateState>,
    changed: Condvar,
}

#[derive(Debug, Default)]
struct GateState {
    entered: usize,
    open: bool,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Called from a work item: register arrival and block until open.
    pub fn pass(&self) {
        let mut state = self.state.lock();
        state.entered += 1;
        self.changed.notify_all();
        while !state.open {
            self.changed.wait(&mut state);
        }
    }

    pub fn open(&self) {
        self.state.lock().open = true;
        self.changed.notify_all();
    }

    pub fn entered(&self) -> usize {
        self.state.lock().entered
    }

    /// Wait until at least `count` items are blocked in [`Self::pass`].
    pub fn wait_entered(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.entered < count {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                return state.entered >= count;
            }
        }
        true
    }
}

/// How a [`FakeNode`]'s job behaves.
#[derive(Debug, Clone, Default)]
pub enum Behaviour {
    /// Every item succeeds.
    #[default]
    Succeed,
    /// `make_build_job` itself returns this error.
    FailJob(String),
    /// Item `n` returns an error.
    FailItem(usize),
    /// Item `n` panics.
    PanicItem(usize),
    /// Item 0 blocks on the gate; the others succeed.
    Gated(Arc<Gate>),
}

/// Shape of a fake node.
#[derive(Debug, Clone)]
pub struct FakeSpec {
    pub inputs: usize,
    pub mandatory: bool,
    pub masks: usize,
    pub items: usize,
    pub data_type: DataType,
    pub behaviour: Behaviour,
}

impl Default for FakeSpec {
    fn default() -> Self {
        Self {
            inputs: 4,
            mandatory: false,
            masks: 1,
            items: 2,
            data_type: DataType::HEIGHTMAP,
            behaviour: Behaviour::Succeed,
        }
    }
}

impl FakeSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inputs(mut self, n: usize) -> Self {
        self.inputs = n;
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn masks(mut self, n: usize) -> Self {
        self.masks = n;
        self
    }

    pub fn items(mut self, n: usize) -> Self {
        self.items = n;
        self
    }

    pub fn data_type(mut self, t: DataType) -> Self {
        self.data_type = t;
        self
    }

    pub fn behaviour(mut self, b: Behaviour) -> Self {
        self.behaviour = b;
        self
    }

    pub fn pins(&self) -> PinLayout {
        let mut layout = PinLayout::new();
        for i in 0..self.inputs {
            let pin = PinDescriptor::new(format!("in{i}"), self.data_type);
            layout = layout.input(if self.mandatory { pin.mandatory() } else { pin });
        }
        for i in 0..self.masks {
            layout = layout.mask(PinDescriptor::new(format!("mask{i}"), self.data_type));
        }
        layout
            .parameter(PinDescriptor::new("param", DataType::SCALAR))
            .output(PinDescriptor::new("out", self.data_type))
    }
}

/// A node implementation that logs what the scheduler asks of it and
/// publishes a `resolution x resolution` buffer filled with its job count.
#[derive(Debug)]
pub struct FakeNode {
    name: String,
    spec: FakeSpec,
    log: EventLog,
    slots: Arc<OutputSlots>,
    jobs: AtomicUsize,
}

impl FakeNode {
    pub fn new(name: impl Into<String>, spec: FakeSpec, log: EventLog) -> Self {
        Self {
            name: name.into(),
            spec,
            log,
            slots: Arc::new(OutputSlots::new(1)),
            jobs: AtomicUsize::new(0),
        }
    }

    /// How many times `make_build_job` has been called.
    pub fn jobs_created(&self) -> usize {
        self.jobs.load(Ordering::SeqCst)
    }
}

impl NodeImplementation for FakeNode {
    fn type_name(&self) -> &str {
        "fake"
    }

    fn make_build_job(&self, ctx: &BuildContext) -> Result<BuildJob, BuildError> {
        let count = self.jobs.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.push(Event::JobCreated {
            node: self.name.clone(),
            inputs: ctx.inputs.len(),
        });

        if let Behaviour::FailJob(message) = &self.spec.behaviour {
            return Err(BuildError::new(message.clone()));
        }

        let mut job = BuildJob::new();
        for item in 0..self.spec.items {
            let behaviour = self.spec.behaviour.clone();
            job.push_item(move || match behaviour {
                Behaviour::FailItem(n) if n == item => {
                    Err(BuildError::new(format!("item {item} failed")))
                }
                Behaviour::PanicItem(n) if n == item => panic!("item {item} panicked"),
                Behaviour::Gated(gate) if item == 0 => {
                    gate.pass();
                    Ok(())
                }
                _ => Ok(()),
            });
        }

        let size = ctx.resolution;
        let generation = ctx.generation;
        let slots = Arc::clone(&self.slots);
        let (complete_log, fail_log, cleanup_log) =
            (self.log.clone(), self.log.clone(), self.log.clone());
        let (complete_name, fail_name, cleanup_name) =
            (self.name.clone(), self.name.clone(), self.name.clone());

        Ok(job
            .on_complete(move || {
                let data = vec![count as f32; size * size];
                slots.publish(generation, 0, ImageBuffer::from_data(size, size, data));
                complete_log.push(Event::Completed(complete_name));
            })
            .on_failure(move || fail_log.push(Event::Failed(fail_name)))
            .on_cleanup(move || cleanup_log.push(Event::Cleanup(cleanup_name))))
    }

    fn output(&self, generation: Generation, pin: usize) -> Option<Arc<ImageBuffer>> {
        self.slots.get(generation, pin)
    }

    fn discard_outputs(&self, generation: Generation) {
        self.slots.clear(generation);
    }
}
