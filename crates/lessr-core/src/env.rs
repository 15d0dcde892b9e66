use crate::ast::Media;
use crate::error::{CompileError, Span};
use crate::imports::Importer;
use crate::mixin::MixinCandidate;
use crate::options::CompileOptions;
use crate::ruleset::Ruleset;
use crate::selector::Selector;
use crate::value::Value;
use log::debug;
use std::cell::RefCell;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

/// Frames captured by a mixin definition, outermost first.
#[derive(Clone)]
pub struct Closure(Rc<[Rc<Ruleset>]>);

impl Closure {
    pub fn frames(&self) -> &[Rc<Ruleset>] {
        &self.0
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Closure({} frames)", self.0.len())
    }
}

/// Mutable state shared by one compilation and the rendering that follows.
///
/// Frames are stored outermost first; lookups walk them in reverse.
pub struct Env {
    frames: Vec<Rc<Ruleset>>,
    selectors: Vec<Vec<Selector>>,
    media_blocks: Vec<Rc<RefCell<Media>>>,
    importer: Option<Box<dyn Importer>>,
    import_stack: Vec<String>,
    resolving: Vec<String>,
    mixin_depth: usize,
    options: CompileOptions,
    pub(crate) tab_level: usize,
    pub(crate) last_rule: bool,
    pub(crate) first_selector: bool,
}

impl Env {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            frames: Vec::new(),
            selectors: Vec::new(),
            media_blocks: Vec::new(),
            importer: None,
            import_stack: Vec::new(),
            resolving: Vec::new(),
            mixin_depth: 0,
            options,
            tab_level: 0,
            last_rule: false,
            first_selector: false,
        }
    }

    pub fn with_importer(mut self, importer: impl Importer + 'static) -> Self {
        self.importer = Some(Box::new(importer));
        self
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn compress(&self) -> bool {
        self.options.compress
    }

    /// Pushes `frame` and its selectors; both are popped when the returned
    /// scope is dropped, including on early error returns.
    pub fn enter(&mut self, frame: Rc<Ruleset>, selectors: Vec<Selector>) -> Scope<'_> {
        self.frames.push(frame);
        self.selectors.push(selectors);
        Scope { env: self }
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    /// Frames from innermost to outermost.
    pub fn frames(&self) -> impl Iterator<Item = &Rc<Ruleset>> {
        self.frames.iter().rev()
    }

    pub fn current_selectors(&self) -> Option<&[Selector]> {
        self.selectors.last().map(Vec::as_slice)
    }

    pub fn capture_frames(&self) -> Closure {
        Closure(self.frames.iter().cloned().collect())
    }

    /// Runs `f` against a replacement frame stack, restoring the current one
    /// afterwards whatever `f` returns.
    pub(crate) fn with_frames<R>(
        &mut self,
        frames: Vec<Rc<Ruleset>>,
        f: impl FnOnce(&mut Env) -> R,
    ) -> R {
        let saved = std::mem::replace(&mut self.frames, frames);
        let result = f(self);
        self.frames = saved;
        result
    }

    pub(crate) fn frames_outermost_first(&self) -> &[Rc<Ruleset>] {
        &self.frames
    }

    pub fn variable(&self, name: &str) -> Option<crate::ast::Declaration> {
        self.frames()
            .find_map(|frame| frame.variable(name))
            .cloned()
    }

    /// Looks `name` up and compiles the value it is bound to.
    pub fn resolve_variable(&mut self, name: &str, span: &Span) -> Result<Value, CompileError> {
        let Some(declaration) = self.variable(name) else {
            return Err(CompileError::UndefinedVariable {
                name: name.to_string(),
                span: span.clone(),
            });
        };
        if self.resolving.iter().any(|pending| pending == name) {
            return Err(CompileError::RecursiveVariable {
                name: name.to_string(),
                span: span.clone(),
            });
        }
        self.resolving.push(name.to_string());
        let value = declaration.value.compile(self, &declaration.span);
        self.resolving.pop();
        value
    }

    /// Candidates for `selector` from the innermost frame that has any.
    pub fn mixin(&self, selector: &Selector) -> Option<Vec<MixinCandidate>> {
        self.frames()
            .map(|frame| frame.find(selector, None))
            .find(|candidates| !candidates.is_empty())
    }

    /// Whether `ruleset` is being compiled further up the stack.
    pub fn is_compiling(&self, ruleset: &Rc<Ruleset>) -> bool {
        self.frames.iter().any(|frame| {
            Rc::ptr_eq(frame, ruleset)
                || frame
                    .original()
                    .is_some_and(|original| Rc::ptr_eq(original, ruleset))
        })
    }

    pub(crate) fn enter_mixin(&mut self) -> Option<usize> {
        if self.mixin_depth >= self.options.max_mixin_depth {
            return None;
        }
        self.mixin_depth += 1;
        Some(self.mixin_depth)
    }

    pub(crate) fn leave_mixin(&mut self) {
        self.mixin_depth = self.mixin_depth.saturating_sub(1);
    }

    pub(crate) fn importer_mut(&mut self) -> Option<&mut (dyn Importer + 'static)> {
        self.importer.as_deref_mut()
    }

    pub(crate) fn import_stack(&mut self) -> &mut Vec<String> {
        &mut self.import_stack
    }

    pub fn media_blocks(&self) -> &[Rc<RefCell<Media>>] {
        &self.media_blocks
    }

    pub(crate) fn register_media(&mut self, media: Rc<RefCell<Media>>) {
        self.media_blocks.push(media);
    }

    /// Hands the innermost selector list to every media block discovered
    /// after `watermark`.
    pub(crate) fn bubble_media(&self, watermark: usize) {
        let Some(selectors) = self.current_selectors() else {
            return;
        };
        if selectors.is_empty() || watermark >= self.media_blocks.len() {
            return;
        }
        debug!(
            "bubbling {} media block(s) through {} selector(s)",
            self.media_blocks.len() - watermark,
            selectors.len()
        );
        for media in &self.media_blocks[watermark..] {
            media.borrow_mut().bubble_selectors(selectors);
        }
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new(CompileOptions::default())
    }
}

/// A frame pushed by [`Env::enter`].
pub struct Scope<'a> {
    env: &'a mut Env,
}

impl Scope<'_> {
    /// Replaces the innermost frame after its rule list was rebuilt.
    pub fn replace_frame(&mut self, frame: Rc<Ruleset>) {
        if let Some(top) = self.env.frames.last_mut() {
            *top = frame;
        }
    }
}

impl Deref for Scope<'_> {
    type Target = Env;

    fn deref(&self) -> &Env {
        self.env
    }
}

impl DerefMut for Scope<'_> {
    fn deref_mut(&mut self) -> &mut Env {
        self.env
    }
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        self.env.frames.pop();
        self.env.selectors.pop();
    }
}
