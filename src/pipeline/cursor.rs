use crate::types::{CursorTarget, TargetId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CursorPhase {
    Idle,
    Hovering(TargetId),
    Clicked(TargetId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CursorEvent {
    HoverChanged(Option<TargetId>),
    Selected(TargetId),
}

/// Hover/click state machine for a hand-driven cursor.
///
/// The cursor's effective point is the centre of its glyph. A target is
/// hovered while that point lies strictly inside its bounds; with overlapping
/// targets the first one in list order wins. Once shut down the engine never
/// emits again.
pub struct CursorEngine {
    targets: Vec<CursorTarget>,
    glyph_size: (f32, f32),
    position: Option<(f32, f32)>,
    phase: CursorPhase,
    shutting_down: bool,
}

impl CursorEngine {
    pub fn new(targets: Vec<CursorTarget>, glyph_size: (f32, f32)) -> Self {
        Self {
            targets,
            glyph_size,
            position: None,
            phase: CursorPhase::Idle,
            shutting_down: false,
        }
    }

    pub fn targets(&self) -> &[CursorTarget] {
        &self.targets
    }

    pub fn phase(&self) -> &CursorPhase {
        &self.phase
    }

    pub fn position(&self) -> Option<(f32, f32)> {
        self.position
    }

    pub fn hovered(&self) -> Option<&TargetId> {
        match &self.phase {
            CursorPhase::Hovering(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutting_down
    }

    /// Top-left corner at which to draw the glyph so it is centred on the
    /// current position.
    pub fn glyph_origin(&self) -> Option<(f32, f32)> {
        self.position
            .map(|(x, y)| (x - self.glyph_size.0 / 2.0, y - self.glyph_size.1 / 2.0))
    }

    fn hit_test(&self, x: f32, y: f32) -> Option<&CursorTarget> {
        self.targets
            .iter()
            .find(|target| target.bounds.contains_strict(x, y))
    }

    /// Moves the cursor centre and re-evaluates the hover state. Returns an
    /// event only when the hovered target changes.
    pub fn update(&mut self, center: (f32, f32), window_active: bool) -> Option<CursorEvent> {
        if self.shutting_down {
            return None;
        }
        self.position = Some(center);
        self.settle();

        let hit = if window_active {
            self.hit_test(center.0, center.1).map(|t| t.id.clone())
        } else {
            None
        };

        let previous = self.hovered().cloned();
        self.phase = match &hit {
            Some(id) => CursorPhase::Hovering(id.clone()),
            None => CursorPhase::Idle,
        };

        if previous == hit {
            return None;
        }
        log::debug!("cursor hover changed: {previous:?} -> {hit:?}");
        Some(CursorEvent::HoverChanged(hit))
    }

    /// Consumes a click signal. Selects the hovered target once; the engine
    /// stays `Clicked` until the next update or click settles it back to idle.
    /// Clicks without a hover are ignored.
    pub fn click(&mut self) -> Option<CursorEvent> {
        if self.shutting_down {
            return None;
        }
        self.settle();
        let CursorPhase::Hovering(id) = &self.phase else {
            log::trace!("click ignored, nothing hovered");
            return None;
        };
        let id = id.clone();

        log::info!("target selected: {id}");
        self.phase = CursorPhase::Clicked(id.clone());

        Some(CursorEvent::Selected(id))
    }

    fn settle(&mut self) {
        if matches!(self.phase, CursorPhase::Clicked(_)) {
            self.phase = CursorPhase::Idle;
        }
    }

    pub fn shutdown(&mut self) {
        self.shutting_down = true;
        self.phase = CursorPhase::Idle;
    }
}
