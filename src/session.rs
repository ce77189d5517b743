//! The editing session.
//!
//! [`EditorSession`] owns one open dashboard: the registry, scene, undo
//! history, renderer and properties form, plus the gesture in progress. All
//! mutation goes through it so every change is snapshotted first, re-rendered
//! afterwards and reflected in the properties panel.
//!
//! Pointer positions are canvas pixels relative to the top-left of the grid.
//! Messages the widgets want to publish collect in an outbox; the caller hands
//! them to a [`Transport`] with [`EditorSession::flush_outbound`].

use crate::config::EditorConfig;
use crate::error::PropertyError;
use crate::history::History;
use crate::layout::{
    hit_test, snap_to_neighbors, DragGesture, Gesture, HitTarget, ResizeGesture, TrashZone,
};
use crate::properties::{validate_property, PropertiesBinder};
use crate::registry::{Interaction, Publish, WidgetRegistry, LABEL_KEY, TOPIC_KEY};
use crate::render::Renderer;
use crate::scene::Scene;
use crate::transport::{Direction, InboundMessage, MessageLog, Transport};
use crate::types::{Dashboard, Mode, ProjectSettings, Widget, WidgetId, WidgetType};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// One open dashboard and everything needed to edit or run it.
#[derive(Debug)]
pub struct EditorSession {
    registry: WidgetRegistry,
    scene: Scene,
    history: History,
    renderer: Renderer,
    properties: PropertiesBinder,
    config: EditorConfig,
    project: ProjectSettings,
    gesture: Option<Gesture>,
    trash: Option<TrashZone>,
    /// Widget receiving runtime pointer input until release
    runtime_target: Option<WidgetId>,
    outbox: Vec<Publish>,
    log: MessageLog,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl EditorSession {
    /// Opens an empty session with the built-in widget types.
    pub fn new(config: EditorConfig) -> Self {
        Self::with_registry(WidgetRegistry::with_builtin_types(), config)
    }

    /// Opens an empty session with a custom registry.
    pub fn with_registry(registry: WidgetRegistry, config: EditorConfig) -> Self {
        let project = ProjectSettings {
            base_topic: config.base_topic.clone(),
            ..ProjectSettings::default()
        };
        log::info!("editing session opened with {} widget types", registry.len());
        Self {
            registry,
            scene: Scene::new(&config.base_topic),
            history: History::new(config.history_capacity),
            renderer: Renderer::new(),
            properties: PropertiesBinder::new(),
            project,
            gesture: None,
            trash: None,
            runtime_target: None,
            outbox: Vec::new(),
            log: MessageLog::default(),
            config,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// The widget type registry.
    pub fn registry(&self) -> &WidgetRegistry {
        &self.registry
    }

    /// The scene model.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// The retained visual model.
    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// The properties form for the selection.
    pub fn properties(&self) -> &PropertiesBinder {
        &self.properties
    }

    /// Session tunables.
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Project settings of the open dashboard.
    pub fn project(&self) -> &ProjectSettings {
        &self.project
    }

    /// The gesture in progress.
    pub fn gesture(&self) -> Option<&Gesture> {
        self.gesture.as_ref()
    }

    /// The trash target, once the canvas has reported where it is.
    pub fn trash(&self) -> Option<TrashZone> {
        self.trash
    }

    /// Console of published and received messages.
    pub fn message_log(&self) -> &MessageLog {
        &self.log
    }

    /// Clears the console.
    pub fn clear_message_log(&mut self) {
        self.log.clear();
    }

    /// Number of undo steps available.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Returns true if [`EditorSession::undo`] would do something.
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Changes whenever the widget list changes; used for unsaved-changes tracking.
    pub fn revision(&self) -> u64 {
        self.scene.revision()
    }

    /// Current mode.
    pub fn mode(&self) -> Mode {
        self.scene.mode()
    }

    /// Replaces the tunables. A different history capacity starts a fresh history.
    pub fn set_config(&mut self, config: EditorConfig) {
        if config.history_capacity != self.history.capacity() {
            self.history = History::new(config.history_capacity);
        }
        if let Some(trash) = self.trash.as_mut() {
            trash.radius = config.trash_radius_px;
        }
        self.config = config;
    }

    /// Updates project settings; the base topic applies to future placements.
    pub fn set_project(&mut self, project: ProjectSettings) {
        self.scene.base_topic.clone_from(&project.base_topic);
        self.project = project;
    }

    /// Moves the trash target (canvas pixels).
    pub fn set_trash_center(&mut self, center: (f32, f32)) {
        self.trash = Some(TrashZone {
            center,
            radius: self.config.trash_radius_px,
        });
    }

    // ------------------------------------------------------------------
    // Internal helpers
    // ------------------------------------------------------------------

    fn refresh(&mut self, id: WidgetId) {
        let selected = self.scene.selected() == Some(id);
        if let Some(widget) = self.scene.get(id) {
            self.renderer.sync(&self.registry, widget, selected);
        }
    }

    fn rebind(&mut self) {
        self.properties
            .bind(&self.registry, self.scene.selected_widget());
    }

    fn min_size(&self, type_tag: WidgetType) -> (u32, u32) {
        self.registry
            .get(type_tag)
            .map(|d| d.min_size)
            .unwrap_or((crate::constants::MIN_WIDGET_CELLS, crate::constants::MIN_WIDGET_CELLS))
    }

    fn is_editing(&self) -> bool {
        self.scene.mode() == Mode::Edit
    }

    // ------------------------------------------------------------------
    // Scene operations
    // ------------------------------------------------------------------

    /// Places a widget at a cell and selects it.
    ///
    /// # Returns
    ///
    /// The new widget's id, or `None` for an unregistered type or in run mode.
    pub fn place_widget(&mut self, type_tag: WidgetType, cell_x: u32, cell_y: u32) -> Option<WidgetId> {
        if !self.is_editing() || self.registry.get(type_tag).is_none() {
            return None;
        }
        let previous = self.scene.selected();
        self.history.snapshot(self.scene.widgets());
        let id = self
            .scene
            .place_widget(&self.registry, type_tag, cell_x, cell_y)?;
        if let Some(previous) = previous {
            self.refresh(previous);
        }
        self.refresh(id);
        self.rebind();
        Some(id)
    }

    /// Places a widget from a textual type tag; unknown tags are ignored.
    pub fn place_widget_by_tag(&mut self, tag: &str, cell_x: u32, cell_y: u32) -> Option<WidgetId> {
        match WidgetType::from_tag(tag) {
            Some(type_tag) => self.place_widget(type_tag, cell_x, cell_y),
            None => {
                log::debug!("ignoring placement of unknown widget type {tag:?}");
                None
            }
        }
    }

    /// Changes the selection (edit mode only). Unknown ids clear it.
    pub fn select(&mut self, id: Option<WidgetId>) {
        if !self.is_editing() {
            return;
        }
        let previous = self.scene.selected();
        self.scene.select(id);
        let current = self.scene.selected();
        if previous == current {
            return;
        }
        for id in [previous, current].into_iter().flatten() {
            self.refresh(id);
        }
        self.rebind();
    }

    /// Moves a widget to a cell, clamped to be non-negative.
    ///
    /// # Returns
    ///
    /// `true` if the widget exists. A move to the current position takes no
    /// undo snapshot.
    pub fn move_widget(&mut self, id: WidgetId, x: i64, y: i64) -> bool {
        let Some(widget) = self.scene.get(id) else {
            return false;
        };
        let target = (x.max(0), y.max(0));
        if target != (i64::from(widget.position.0), i64::from(widget.position.1)) {
            self.history.snapshot(self.scene.widgets());
            self.scene.move_widget(id, x, y);
            self.refresh(id);
        }
        true
    }

    /// Resizes a widget, clamped to its type's minimum size.
    pub fn resize_widget(&mut self, id: WidgetId, width: i64, height: i64) -> bool {
        let Some(widget) = self.scene.get(id) else {
            return false;
        };
        let min = self.min_size(widget.type_tag);
        let target = (width.max(i64::from(min.0)), height.max(i64::from(min.1)));
        if target != (i64::from(widget.size.0), i64::from(widget.size.1)) {
            self.history.snapshot(self.scene.widgets());
            self.scene.resize_widget(&self.registry, id, width, height);
            self.refresh(id);
        }
        true
    }

    /// Deletes a widget.
    pub fn delete_widget(&mut self, id: WidgetId) -> bool {
        if !self.scene.contains(id) {
            return false;
        }
        self.cancel_gesture();
        self.history.snapshot(self.scene.widgets());
        if let Some(removed) = self.scene.delete_widget(id) {
            log::debug!("deleted {}", removed.label);
        }
        self.renderer.remove(id);
        self.rebind();
        true
    }

    /// Deletes the selected widget, if any.
    pub fn delete_selected(&mut self) -> bool {
        match self.scene.selected() {
            Some(id) if self.is_editing() => self.delete_widget(id),
            _ => false,
        }
    }

    /// Moves the selected widget by whole cells (one undo step per call).
    pub fn nudge(&mut self, dx: i64, dy: i64) -> bool {
        if !self.is_editing() || self.gesture.is_some() {
            return false;
        }
        let Some(widget) = self.scene.selected_widget() else {
            return false;
        };
        let (x, y) = (
            i64::from(widget.position.0) + dx,
            i64::from(widget.position.1) + dy,
        );
        let id = widget.id;
        self.move_widget(id, x, y)
    }

    /// Validates and applies one property value.
    ///
    /// `label` and `topic` edit the dedicated fields. Invalid values leave the
    /// widget untouched and take no snapshot; so does a value equal to the
    /// current one.
    ///
    /// # Returns
    ///
    /// `Ok(true)` if the widget changed, `Ok(false)` for a missing widget or
    /// an unchanged value.
    pub fn update_property(&mut self, id: WidgetId, key: &str, value: &str) -> Result<bool, PropertyError> {
        let Some(widget) = self.scene.get(id) else {
            return Ok(false);
        };
        let value = validate_property(self.registry.get(widget.type_tag), key, value)?;
        let current = match key {
            LABEL_KEY => widget.label.as_str(),
            TOPIC_KEY => widget.topic.as_str(),
            _ => widget.property(key),
        };
        if current == value {
            return Ok(false);
        }

        self.history.snapshot(self.scene.widgets());
        self.scene.set_property(id, key, &value);
        let selected = self.scene.selected() == Some(id);
        if let Some(widget) = self.scene.get(id) {
            self.renderer
                .apply_property_edit(&self.registry, widget, selected);
        }
        if self.properties.form().is_some_and(|f| f.widget_id == id) {
            self.properties.accept(key, &value);
        }
        self.rebind();
        Ok(true)
    }

    /// Updates the draft text of a properties-panel field.
    pub fn set_property_draft(&mut self, key: &str, text: &str) {
        self.properties.set_draft(key, text);
    }

    /// Commits a properties-panel draft through [`EditorSession::update_property`].
    ///
    /// A rejected draft is recorded on the field and logged; the widget keeps
    /// its previous value.
    pub fn commit_property_edit(&mut self, key: &str) -> Result<bool, PropertyError> {
        let Some((id, draft)) = self.properties.draft(key) else {
            return Ok(false);
        };
        match self.update_property(id, key, &draft) {
            Ok(changed) => {
                self.properties.revert(key);
                Ok(changed)
            }
            Err(err) => {
                log::warn!("rejected property edit: {err}");
                self.properties.reject(key, err.clone());
                Err(err)
            }
        }
    }

    /// Switches between edit and run mode.
    ///
    /// Leaving edit mode cancels any gesture, clears the selection and hides
    /// the edit-only chrome.
    pub fn set_mode(&mut self, mode: Mode) {
        if mode == self.scene.mode() {
            return;
        }
        self.cancel_gesture();
        self.finish_runtime_input();
        self.scene.set_mode(mode);
        self.renderer.edit_chrome = mode == Mode::Edit;
        self.renderer.clear_overlays();
        self.renderer
            .sync_all(&self.registry, self.scene.widgets(), self.scene.selected());
        self.rebind();
        log::info!("switched to {mode:?} mode");
    }

    /// Restores the widget list saved before the most recent mutation.
    ///
    /// Clears the selection and re-syncs every element. No-op when the
    /// history is empty.
    pub fn undo(&mut self) -> bool {
        self.cancel_gesture();
        let Some(widgets) = self.history.undo() else {
            return false;
        };
        self.scene.replace_widgets(widgets);
        self.renderer
            .sync_all(&self.registry, self.scene.widgets(), None);
        self.rebind();
        log::info!("undo ({} steps left)", self.history.len());
        true
    }

    // ------------------------------------------------------------------
    // Gestures
    // ------------------------------------------------------------------

    /// Routes a pointer press on the canvas.
    ///
    /// In edit mode a press while a gesture is active cancels that gesture.
    /// Otherwise it starts a resize on a handle, a drag on a body, or clears
    /// the selection on empty canvas. In run mode it feeds the widget under
    /// the pointer.
    pub fn pointer_down(&mut self, pointer: (f32, f32)) {
        if !self.is_editing() {
            self.finish_runtime_input();
            if let Some((id, _)) = hit_test(self.scene.widgets(), pointer, &self.config) {
                self.runtime_target = Some(id);
                let fraction = self.fraction_within(id, pointer);
                self.runtime_input(id, Interaction::Press { fraction });
            }
            return;
        }
        if self.gesture.is_some() {
            self.cancel_gesture();
            return;
        }
        match hit_test(self.scene.widgets(), pointer, &self.config) {
            Some((id, HitTarget::ResizeHandle)) => {
                self.begin_resize(id, pointer);
            }
            Some((id, HitTarget::Body)) => {
                self.begin_drag(id, pointer);
            }
            None => self.select(None),
        }
    }

    /// Routes a pointer move to the active gesture or runtime target.
    pub fn pointer_move(&mut self, pointer: (f32, f32)) {
        if !self.is_editing() {
            if let Some(id) = self.runtime_target {
                let fraction = self.fraction_within(id, pointer);
                self.runtime_input(id, Interaction::Drag { fraction });
            }
            return;
        }
        match self.gesture {
            Some(Gesture::Drag(_)) => self.update_drag(pointer),
            Some(Gesture::Resize(_)) => self.update_resize(pointer),
            None => {}
        }
    }

    /// Routes a pointer release, finishing the active gesture.
    pub fn pointer_up(&mut self, pointer: (f32, f32)) {
        if !self.is_editing() {
            self.finish_runtime_input();
            return;
        }
        match self.gesture {
            Some(Gesture::Drag(_)) => {
                self.update_drag(pointer);
                self.end_drag();
            }
            Some(Gesture::Resize(_)) => {
                self.update_resize(pointer);
                self.end_resize();
            }
            None => {}
        }
    }

    /// Starts dragging `id`: snapshot, select, show the trash target.
    pub fn begin_drag(&mut self, id: WidgetId, pointer: (f32, f32)) -> bool {
        if !self.is_editing() {
            return false;
        }
        self.cancel_gesture();
        let Some(start_position) = self.scene.get(id).map(|w| w.position) else {
            return false;
        };
        self.history.snapshot(self.scene.widgets());
        self.select(Some(id));
        self.gesture = Some(Gesture::Drag(DragGesture {
            widget_id: id,
            start_position,
            pointer_origin: pointer,
            pending_delete: false,
            guides: Default::default(),
        }));
        self.renderer.trash_visible = true;
        log::debug!("drag started at {start_position:?}");
        true
    }

    /// Applies one pointer sample to the active drag.
    pub fn update_drag(&mut self, pointer: (f32, f32)) {
        let Some(Gesture::Drag(drag)) = self.gesture.as_mut() else {
            return;
        };
        let Some(widget) = self.scene.get(drag.widget_id) else {
            self.gesture = None;
            self.renderer.clear_overlays();
            return;
        };

        let candidate = drag.candidate(&self.config, pointer);
        let snapped = snap_to_neighbors(
            self.scene.widgets(),
            drag.widget_id,
            candidate,
            widget.size,
            self.config.align_threshold,
        );
        let pending_delete = self.trash.is_some_and(|trash| trash.contains(pointer));
        drag.guides = snapped.guides;
        drag.pending_delete = pending_delete;
        let id = drag.widget_id;

        self.scene.move_widget(
            id,
            i64::from(snapped.position.0),
            i64::from(snapped.position.1),
        );
        self.renderer.guides = snapped.guides;
        self.renderer.trash_active = pending_delete;
        self.renderer.set_dimmed(id, pending_delete);
        self.refresh(id);
    }

    /// Finishes the active drag: deletes over the trash, otherwise keeps the
    /// last snapped position. Guides and trash highlighting are always cleared.
    pub fn end_drag(&mut self) {
        if !matches!(self.gesture, Some(Gesture::Drag(_))) {
            return;
        }
        let Some(Gesture::Drag(drag)) = self.gesture.take() else {
            return;
        };
        self.renderer.clear_overlays();
        self.renderer.set_dimmed(drag.widget_id, false);

        if drag.pending_delete {
            if let Some(removed) = self.scene.delete_widget(drag.widget_id) {
                log::debug!("{} dropped on trash", removed.label);
            }
            self.renderer.remove(drag.widget_id);
            self.rebind();
            return;
        }

        let moved = self
            .scene
            .get(drag.widget_id)
            .is_some_and(|w| w.position != drag.start_position);
        if !moved {
            self.history.discard_latest();
        }
        self.refresh(drag.widget_id);
    }

    /// Starts resizing `id` from its bottom-right handle.
    pub fn begin_resize(&mut self, id: WidgetId, pointer: (f32, f32)) -> bool {
        if !self.is_editing() {
            return false;
        }
        self.cancel_gesture();
        let Some(start_size) = self.scene.get(id).map(|w| w.size) else {
            return false;
        };
        self.history.snapshot(self.scene.widgets());
        self.select(Some(id));
        self.gesture = Some(Gesture::Resize(ResizeGesture {
            widget_id: id,
            start_size,
            pointer_origin: pointer,
        }));
        true
    }

    /// Applies one pointer sample to the active resize.
    pub fn update_resize(&mut self, pointer: (f32, f32)) {
        let Some(Gesture::Resize(resize)) = self.gesture.as_ref() else {
            return;
        };
        let id = resize.widget_id;
        let (width, height) = resize.requested_size(&self.config, pointer);
        if !self.scene.resize_widget(&self.registry, id, width, height) {
            self.gesture = None;
            return;
        }
        self.refresh(id);
    }

    /// Finishes the active resize. The size is already committed.
    pub fn end_resize(&mut self) {
        let Some(Gesture::Resize(resize)) = self.gesture.take() else {
            return;
        };
        let resized = self
            .scene
            .get(resize.widget_id)
            .is_some_and(|w| w.size != resize.start_size);
        if !resized {
            self.history.discard_latest();
        }
    }

    /// Abandons the active gesture.
    ///
    /// Restores the widget's start geometry, drops the snapshot taken when the
    /// gesture began and hides guides and the trash target.
    ///
    /// # Returns
    ///
    /// `true` if there was a gesture to cancel.
    pub fn cancel_gesture(&mut self) -> bool {
        let Some(gesture) = self.gesture.take() else {
            return false;
        };
        let id = gesture.widget_id();
        match gesture {
            Gesture::Drag(drag) => {
                self.scene.move_widget(
                    id,
                    i64::from(drag.start_position.0),
                    i64::from(drag.start_position.1),
                );
            }
            Gesture::Resize(resize) => {
                self.scene.resize_widget(
                    &self.registry,
                    id,
                    i64::from(resize.start_size.0),
                    i64::from(resize.start_size.1),
                );
            }
        }
        self.history.discard_latest();
        self.renderer.clear_overlays();
        self.renderer.set_dimmed(id, false);
        self.refresh(id);
        log::debug!("gesture cancelled");
        true
    }

    // ------------------------------------------------------------------
    // Runtime
    // ------------------------------------------------------------------

    fn fraction_within(&self, id: WidgetId, pointer: (f32, f32)) -> f32 {
        let Some(widget) = self.scene.get(id) else {
            return 0.0;
        };
        let left = widget.position.0 as f32 * self.config.cell_px;
        let width = widget.size.0 as f32 * self.config.cell_px;
        if width <= 0.0 {
            return 0.0;
        }
        ((pointer.0 - left) / width).clamp(0.0, 1.0)
    }

    fn runtime_input(&mut self, id: WidgetId, input: Interaction) {
        if let Some(widget) = self.scene.get(id) {
            let publishes = self.renderer.apply_input(&self.registry, widget, input);
            self.outbox.extend(publishes);
        }
    }

    fn finish_runtime_input(&mut self) {
        if let Some(id) = self.runtime_target.take() {
            self.runtime_input(id, Interaction::Release);
        }
    }

    /// Queues a message typed into the console.
    pub fn publish_manual(&mut self, topic: &str, payload: &str) -> bool {
        let topic = topic.trim();
        if topic.is_empty() || topic.contains(['+', '#']) {
            return false;
        }
        self.outbox.push(Publish {
            topic: topic.to_string(),
            payload: payload.to_string(),
        });
        true
    }

    /// Takes the queued outbound messages.
    pub fn take_outbox(&mut self) -> Vec<Publish> {
        std::mem::take(&mut self.outbox)
    }

    /// Hands queued outbound messages to `transport`, logging each one.
    pub fn flush_outbound(&mut self, transport: &mut dyn Transport) -> usize {
        let outbox = self.take_outbox();
        for message in &outbox {
            self.log
                .push(Direction::Outbound, &message.topic, &message.payload);
            transport.publish(&message.topic, &message.payload);
        }
        outbox.len()
    }

    /// Distinct non-empty topics the widgets are bound to.
    pub fn subscriptions(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.scene
            .widgets()
            .iter()
            .filter(|w| !w.topic.is_empty())
            .filter(|w| seen.insert(w.topic.as_str()))
            .map(|w| w.topic.clone())
            .collect()
    }

    /// Delivers an inbound message to every widget bound to exactly `topic`.
    ///
    /// Only the affected elements change; the scene is not touched.
    ///
    /// # Returns
    ///
    /// Number of widgets whose visual content changed.
    pub fn handle_message(&mut self, topic: &str, payload: &str) -> usize {
        self.log.push(Direction::Inbound, topic, payload);
        let mut changed = 0;
        for widget in self.scene.widgets() {
            if widget.topic.is_empty() || widget.topic != topic {
                continue;
            }
            if self.renderer.apply_message(&self.registry, widget, payload) {
                changed += 1;
            }
        }
        changed
    }

    /// Delivers a batch drained from the inbound queue.
    pub fn handle_inbound(&mut self, messages: Vec<InboundMessage>) -> usize {
        messages
            .into_iter()
            .map(|message| self.handle_message(&message.topic, &message.payload))
            .sum()
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Snapshot of the open dashboard for saving.
    pub fn to_dashboard(&self) -> Dashboard {
        Dashboard {
            project: self.project.clone(),
            widgets: self.scene.widgets().to_vec(),
            ..Dashboard::default()
        }
    }

    /// Replaces the open dashboard.
    ///
    /// Widgets of unregistered types are dropped, duplicate ids and type-local
    /// indices reassigned and geometry clamped. The history is cleared and the session returns to
    /// edit mode.
    pub fn load_dashboard(&mut self, dashboard: Dashboard) {
        self.cancel_gesture();
        self.finish_runtime_input();
        self.outbox.clear();

        let mut seen = HashSet::new();
        let mut widgets: Vec<Widget> = Vec::with_capacity(dashboard.widgets.len());
        for mut widget in dashboard.widgets {
            let Some(descriptor) = self.registry.get(widget.type_tag) else {
                log::warn!("dropping widget of unregistered type {}", widget.type_tag);
                continue;
            };
            if !seen.insert(widget.id) {
                widget.id = Uuid::new_v4();
                seen.insert(widget.id);
            }
            widget.size.0 = widget.size.0.max(descriptor.min_size.0);
            widget.size.1 = widget.size.1.max(descriptor.min_size.1);
            widgets.push(widget);
        }
        unique_type_local_indices(&mut widgets);

        log::info!(
            "loaded dashboard {:?} with {} widgets",
            dashboard.project.name,
            widgets.len()
        );
        self.set_project(dashboard.project);
        self.scene.set_mode(Mode::Edit);
        self.scene.replace_widgets(widgets);
        self.history.clear();
        self.renderer = Renderer::new();
        self.renderer
            .sync_all(&self.registry, self.scene.widgets(), None);
        self.rebind();
    }
}

/// Gives every widget an index that is unique within its type.
///
/// The first widget holding a positive index keeps it. Zero and repeated
/// indices move to the smallest index still free for that type.
fn unique_type_local_indices(widgets: &mut [Widget]) {
    let mut taken: HashMap<WidgetType, HashSet<u32>> = HashMap::new();
    let mut needs_index = Vec::new();
    for (pos, widget) in widgets.iter().enumerate() {
        let used = taken.entry(widget.type_tag).or_default();
        if widget.type_local_index == 0 || !used.insert(widget.type_local_index) {
            needs_index.push(pos);
        }
    }
    for pos in needs_index {
        let widget = &mut widgets[pos];
        let used = taken.entry(widget.type_tag).or_default();
        let index = (1..=u32::MAX)
            .find(|candidate| !used.contains(candidate))
            .unwrap_or(u32::MAX);
        used.insert(index);
        log::debug!(
            "reassigned {} index {} to {}",
            widget.type_tag,
            widget.type_local_index,
            index
        );
        widget.type_local_index = index;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::WidgetContent;
    use crate::transport::{LoopbackTransport, MessageQueue};

    const CELL: f32 = 20.0;

    fn session() -> EditorSession {
        let mut session = EditorSession::default();
        session.set_trash_center((400.0, 500.0));
        session
    }

    fn px(cell: u32) -> f32 {
        cell as f32 * CELL
    }

    fn widgets(session: &EditorSession) -> Vec<Widget> {
        session.scene().widgets().to_vec()
    }

    #[test]
    fn test_type_local_index_reuses_lowest_free_slot() {
        let mut session = session();
        let first = session.place_widget(WidgetType::Button, 0, 0).unwrap();
        session.place_widget(WidgetType::Button, 10, 0).unwrap();
        session.delete_widget(first);
        let third = session.place_widget(WidgetType::Button, 0, 10).unwrap();
        let widget = session.scene().get(third).unwrap();
        assert_eq!(widget.type_local_index, 1);
        assert_eq!(widget.label, "BUTTON 1");
        assert_eq!(widget.topic, "panelcraft/button/1");
    }

    #[test]
    fn test_unknown_type_places_nothing() {
        let mut session = session();
        assert!(session.place_widget_by_tag("GAUGE", 1, 1).is_none());
        assert!(session.scene().widgets().is_empty());
        assert!(!session.can_undo());

        let mut empty = EditorSession::with_registry(WidgetRegistry::new(), EditorConfig::default());
        assert!(empty.place_widget(WidgetType::Led, 1, 1).is_none());
        assert!(empty.renderer().is_empty());
    }

    #[test]
    fn test_undo_restores_state_before_each_operation() {
        let mut session = session();
        let id = session.place_widget(WidgetType::Slider, 2, 2).unwrap();
        let other = session.place_widget(WidgetType::Led, 12, 2).unwrap();

        let before = widgets(&session);
        assert!(session.move_widget(id, 5, 6));
        assert!(session.undo());
        assert_eq!(widgets(&session), before);
        assert_eq!(session.scene().selected(), None);

        session.resize_widget(id, 10, 10);
        session.undo();
        assert_eq!(widgets(&session), before);

        session.update_property(id, "max", "50").unwrap();
        session.undo();
        assert_eq!(widgets(&session), before);

        session.delete_widget(other);
        session.undo();
        assert_eq!(widgets(&session), before);
        assert_eq!(session.renderer().len(), 2);

        session.place_widget(WidgetType::Text, 0, 0);
        session.undo();
        assert_eq!(widgets(&session), before);
    }

    #[test]
    fn test_undo_restores_rendered_content_of_property_edits() {
        let mut session = session();
        let button = session.place_widget(WidgetType::Button, 0, 0).unwrap();
        let slider = session.place_widget(WidgetType::Slider, 10, 0).unwrap();

        session.update_property(button, "text", "GO").unwrap();
        session.update_property(slider, "max", "10").unwrap();
        assert!(matches!(
            &session.renderer().element(button).unwrap().content,
            WidgetContent::Button { caption, .. } if caption == "GO"
        ));

        assert!(session.undo());
        assert!(matches!(
            session.renderer().element(slider).unwrap().content,
            WidgetContent::Slider { max, .. } if max == 100.0
        ));
        assert!(session.undo());
        assert!(matches!(
            &session.renderer().element(button).unwrap().content,
            WidgetContent::Button { caption, .. } if caption == "PUSH"
        ));
        assert_eq!(session.renderer().creations(), 2);
    }

    #[test]
    fn test_widget_at_grid_edge_does_not_break_hit_testing() {
        let mut session = session();
        let id = session.place_widget(WidgetType::Led, 0, 0).unwrap();
        assert!(session.move_widget(id, i64::MAX, i64::MAX));
        let widget = session.scene().get(id).unwrap();
        assert_eq!(widget.position, (u32::MAX, u32::MAX));
        assert_eq!(widget.right(), u32::MAX);

        session.pointer_down((1.0, 1.0));
        session.pointer_up((1.0, 1.0));
        assert_eq!(session.scene().selected(), None);
        assert_eq!(session.scene().get(id).unwrap().position, (u32::MAX, u32::MAX));
    }

    #[test]
    fn test_undo_on_empty_history_is_noop() {
        let mut session = session();
        assert!(!session.undo());
        assert!(session.scene().widgets().is_empty());
    }

    #[test]
    fn test_history_keeps_only_last_twenty_steps() {
        let mut session = session();
        let id = session.place_widget(WidgetType::Led, 0, 0).unwrap();
        for x in 1..=25 {
            session.move_widget(id, x, 0);
        }
        assert_eq!(session.history_len(), 20);

        let mut undone = 0;
        for _ in 0..25 {
            if session.undo() {
                undone += 1;
            }
        }
        assert_eq!(undone, 20);
        assert_eq!(session.scene().get(id).unwrap().position, (5, 0));
    }

    #[test]
    fn test_resize_never_goes_below_minimum() {
        let mut session = session();
        let id = session.place_widget(WidgetType::Thermometer, 1, 1).unwrap();
        session.resize_widget(id, -1_000, 0);
        assert_eq!(session.scene().get(id).unwrap().size, (2, 2));

        let handle = (px(3) - 2.0, px(3) - 2.0);
        session.pointer_down(handle);
        assert!(matches!(session.gesture(), Some(Gesture::Resize(_))));
        session.pointer_move((handle.0 - 400.0, handle.1 - 400.0));
        session.pointer_up((handle.0 - 400.0, handle.1 - 400.0));
        assert_eq!(session.scene().get(id).unwrap().size, (2, 2));
        assert!(session.gesture().is_none());
    }

    #[test]
    fn test_resize_gesture_rounds_deltas_and_is_one_undo_step() {
        let mut session = session();
        let id = session.place_widget(WidgetType::Button, 0, 0).unwrap();
        let steps = session.history_len();
        let handle = (px(6) - 3.0, px(3) - 3.0);
        session.pointer_down(handle);
        session.pointer_move((handle.0 + 30.0, handle.1 + 10.0));
        session.pointer_move((handle.0 + 41.0, handle.1 + 49.0));
        session.pointer_up((handle.0 + 41.0, handle.1 + 49.0));
        assert_eq!(session.scene().get(id).unwrap().size, (8, 5));
        assert_eq!(session.history_len(), steps + 1);
        session.undo();
        assert_eq!(session.scene().get(id).unwrap().size, (6, 3));
    }

    #[test]
    fn test_drag_never_goes_negative() {
        let mut session = session();
        let id = session.place_widget(WidgetType::Led, 2, 2).unwrap();
        session.pointer_down((px(3), px(3)));
        session.pointer_move((-300.0, -300.0));
        assert_eq!(session.scene().get(id).unwrap().position, (0, 0));
        session.pointer_up((-300.0, -300.0));
        assert_eq!(session.scene().get(id).unwrap().position, (0, 0));
        assert!(session.move_widget(id, -4, -9));
        assert_eq!(session.scene().get(id).unwrap().position, (0, 0));
    }

    #[test]
    fn test_drag_snaps_to_neighbour_left_edge() {
        let mut session = session();
        session.place_widget(WidgetType::Switch, 0, 0).unwrap();
        let b = session.place_widget(WidgetType::Led, 10, 10).unwrap();

        let grab = (px(11), px(11));
        session.pointer_down(grab);
        session.pointer_move((grab.0 - 190.0, grab.1));
        assert_eq!(session.scene().get(b).unwrap().position.0, 0);
        assert_eq!(session.renderer().guides.vertical, Some(0.0));

        session.pointer_up((grab.0 - 190.0, grab.1));
        assert_eq!(session.scene().get(b).unwrap().position, (0, 10));
        assert!(session.renderer().guides.is_empty());
        assert!(!session.renderer().trash_visible);
    }

    #[test]
    fn test_whole_drag_is_one_undo_step() {
        let mut session = session();
        let id = session.place_widget(WidgetType::Text, 1, 1).unwrap();
        let before = widgets(&session);
        let steps = session.history_len();

        session.pointer_down((px(2), px(2)));
        for step in 1..=10 {
            session.pointer_move((px(2) + step as f32 * 20.0, px(2)));
        }
        session.pointer_up((px(12), px(2)));
        assert_eq!(session.scene().get(id).unwrap().position, (11, 1));
        assert_eq!(session.history_len(), steps + 1);

        session.undo();
        assert_eq!(widgets(&session), before);
    }

    #[test]
    fn test_click_without_movement_leaves_no_undo_step() {
        let mut session = session();
        let id = session.place_widget(WidgetType::Text, 1, 1).unwrap();
        session.select(None);
        let steps = session.history_len();
        session.pointer_down((px(2), px(2)));
        session.pointer_up((px(2) + 4.0, px(2)));
        assert_eq!(session.scene().selected(), Some(id));
        assert_eq!(session.history_len(), steps);
    }

    #[test]
    fn test_drag_to_trash_deletes() {
        let mut session = session();
        let id = session.place_widget(WidgetType::Camera, 1, 1).unwrap();
        session.pointer_down((px(2), px(2)));
        session.pointer_move((430.0, 520.0));
        assert!(session.renderer().trash_active);
        assert!(session.renderer().element(id).unwrap().dimmed);

        session.pointer_up((430.0, 520.0));
        assert!(session.scene().get(id).is_none());
        assert!(session.renderer().element(id).is_none());
        assert_eq!(session.scene().selected(), None);
        assert!(!session.renderer().trash_active);
        assert!(session.properties().form().is_none());

        assert!(session.undo());
        assert!(session.scene().get(id).is_some());
    }

    #[test]
    fn test_release_outside_trash_keeps_widget() {
        let mut session = session();
        let id = session.place_widget(WidgetType::Camera, 1, 1).unwrap();
        session.pointer_down((px(2), px(2)));
        session.pointer_move((420.0, 500.0));
        session.pointer_move((500.0, 500.0));
        assert!(!session.renderer().trash_active);
        session.pointer_up((500.0, 500.0));
        let widget = session.scene().get(id).unwrap();
        assert_eq!(widget.position, (1 + 23, 1 + 23));
        assert!(!session.renderer().element(id).unwrap().dimmed);
    }

    #[test]
    fn test_cancel_restores_start_and_discards_snapshot() {
        let mut session = session();
        let id = session.place_widget(WidgetType::Switch, 3, 3).unwrap();
        let steps = session.history_len();

        session.pointer_down((px(4), px(4)));
        session.pointer_move((px(9), px(4)));
        assert_eq!(session.scene().get(id).unwrap().position, (8, 3));

        assert!(session.cancel_gesture());
        assert_eq!(session.scene().get(id).unwrap().position, (3, 3));
        assert_eq!(session.history_len(), steps);
        assert!(session.renderer().guides.is_empty());
        assert!(!session.renderer().trash_visible);

        session.pointer_move((px(12), px(4)));
        session.pointer_up((px(12), px(4)));
        assert_eq!(session.scene().get(id).unwrap().position, (3, 3));
        assert!(!session.cancel_gesture());
    }

    #[test]
    fn test_second_press_during_gesture_cancels_it() {
        let mut session = session();
        let id = session.place_widget(WidgetType::Led, 0, 0).unwrap();
        session.pointer_down((px(1), px(1)));
        session.pointer_move((px(6), px(1)));
        session.pointer_down((px(6), px(1)));
        assert!(session.gesture().is_none());
        assert_eq!(session.scene().get(id).unwrap().position, (0, 0));
    }

    #[test]
    fn test_gesture_on_deleted_widget_is_noop() {
        let mut session = session();
        let id = session.place_widget(WidgetType::Led, 0, 0).unwrap();
        assert!(!session.begin_drag(Uuid::new_v4(), (0.0, 0.0)));
        assert!(!session.begin_resize(Uuid::new_v4(), (0.0, 0.0)));
        assert!(!session.move_widget(Uuid::new_v4(), 3, 3));
        assert_eq!(session.update_property(Uuid::new_v4(), "color", "#FFFFFF"), Ok(false));

        session.begin_drag(id, (px(1), px(1)));
        session.scene.delete_widget(id);
        session.update_drag((px(5), px(5)));
        assert!(session.gesture().is_none());
        session.end_drag();
        assert!(session.scene().widgets().is_empty());
    }

    #[test]
    fn test_rejected_property_edit_keeps_value_and_history() {
        let mut session = session();
        let id = session.place_widget(WidgetType::Slider, 0, 0).unwrap();
        let steps = session.history_len();

        session.set_property_draft("max", "lots");
        let result = session.commit_property_edit("max");
        assert!(matches!(result, Err(PropertyError::NotANumber { .. })));
        assert_eq!(session.scene().get(id).unwrap().property("max"), "100");
        assert_eq!(session.history_len(), steps);
        let field = session.properties().form().unwrap().field("max").unwrap().clone();
        assert_eq!(field.value, "100");
        assert!(field.error.is_some());

        session.set_property_draft("max", " 40 ");
        assert_eq!(session.commit_property_edit("max"), Ok(true));
        assert_eq!(session.scene().get(id).unwrap().property("max"), "40");
        assert_eq!(session.history_len(), steps + 1);
        let field = session.properties().form().unwrap().field("max").unwrap();
        assert!(field.error.is_none());
        assert_eq!(field.draft, "40");
        assert!(matches!(
            session.renderer().element(id).unwrap().content,
            WidgetContent::Slider { max, .. } if max == 40.0
        ));
    }

    #[test]
    fn test_label_and_topic_edits_rerender() {
        let mut session = session();
        let id = session.place_widget(WidgetType::Led, 0, 0).unwrap();
        session.update_property(id, LABEL_KEY, "Hall").unwrap();
        assert_eq!(session.renderer().element(id).unwrap().label, "Hall");
        assert!(session.update_property(id, TOPIC_KEY, "home/#").is_err());
        assert_eq!(session.update_property(id, LABEL_KEY, "Hall"), Ok(false));
    }

    #[test]
    fn test_properties_follow_selection() {
        let mut session = session();
        let a = session.place_widget(WidgetType::Button, 0, 0).unwrap();
        let b = session.place_widget(WidgetType::Switch, 10, 0).unwrap();
        assert_eq!(session.properties().form().unwrap().widget_id, b);
        session.select(Some(a));
        assert_eq!(session.properties().form().unwrap().widget_id, a);
        assert!(session.renderer().element(a).unwrap().selected);
        assert!(!session.renderer().element(b).unwrap().selected);
        session.pointer_down((px(30), px(30)));
        assert!(session.properties().form().is_none());
    }

    #[test]
    fn test_run_mode_clears_selection_and_chrome() {
        let mut session = session();
        session.place_widget(WidgetType::Button, 0, 0).unwrap();
        session.pointer_down((px(1), px(1)));
        session.pointer_move((px(5), px(1)));

        session.set_mode(Mode::Run);
        assert!(session.gesture().is_none());
        assert_eq!(session.scene().get(session.scene().widgets()[0].id).unwrap().position, (0, 0));
        assert_eq!(session.scene().selected(), None);
        assert!(!session.renderer().edit_chrome);
        assert!(session.properties().form().is_none());
        assert!(session.place_widget(WidgetType::Led, 0, 0).is_none());
        assert!(!session.delete_selected());

        session.set_mode(Mode::Edit);
        assert!(session.renderer().edit_chrome);
    }

    #[test]
    fn test_run_mode_switch_publishes_and_loopback_lights_led() {
        let mut session = session();
        let switch = session.place_widget(WidgetType::Switch, 0, 0).unwrap();
        let led = session.place_widget(WidgetType::Led, 10, 0).unwrap();
        session.update_property(led, TOPIC_KEY, "panelcraft/switch/1").unwrap();

        let queue = MessageQueue::new();
        let mut transport = LoopbackTransport::new(queue.sender());
        transport.connect();
        for topic in session.subscriptions() {
            transport.subscribe(&topic);
        }
        assert_eq!(session.subscriptions(), vec!["panelcraft/switch/1".to_string()]);

        session.set_mode(Mode::Run);
        session.pointer_down((px(2), px(2)));
        session.pointer_up((px(2), px(2)));
        assert_eq!(session.flush_outbound(&mut transport), 1);

        // the switch is already on, so only the LED changes
        let changed = session.handle_inbound(queue.drain());
        assert_eq!(changed, 1);
        assert_eq!(
            session.renderer().element(led).unwrap().content,
            WidgetContent::Led { lit: true }
        );
        assert_eq!(
            session.renderer().element(switch).unwrap().content,
            WidgetContent::Switch { on: true }
        );
        assert_eq!(session.message_log().len(), 2);
    }

    #[test]
    fn test_messages_route_by_exact_topic() {
        let mut session = session();
        let a = session.place_widget(WidgetType::Led, 0, 0).unwrap();
        let b = session.place_widget(WidgetType::Led, 5, 0).unwrap();
        session.update_property(a, TOPIC_KEY, "home/led").unwrap();
        session.update_property(b, TOPIC_KEY, "home/led2").unwrap();
        let revision = session.revision();

        assert_eq!(session.handle_message("home/led", "on"), 1);
        assert_eq!(session.renderer().element(a).unwrap().content, WidgetContent::Led { lit: true });
        assert_eq!(session.renderer().element(b).unwrap().content, WidgetContent::Led { lit: false });
        assert_eq!(session.handle_message("nobody/listens", "on"), 0);
        assert_eq!(session.revision(), revision);
    }

    #[test]
    fn test_content_survives_moves() {
        let mut session = session();
        let led = session.place_widget(WidgetType::Led, 0, 0).unwrap();
        session.handle_message("panelcraft/led/1", "1");
        session.move_widget(led, 4, 4);
        assert_eq!(session.renderer().element(led).unwrap().content, WidgetContent::Led { lit: true });
        assert_eq!(session.renderer().creations(), 1);
    }

    #[test]
    fn test_nudge_and_delete_selected() {
        let mut session = session();
        let id = session.place_widget(WidgetType::Led, 1, 1).unwrap();
        assert!(session.nudge(-1, 0));
        assert!(session.nudge(-1, 0));
        assert_eq!(session.scene().get(id).unwrap().position, (0, 1));
        let steps = session.history_len();
        session.nudge(-1, 0);
        assert_eq!(session.history_len(), steps);

        assert!(session.delete_selected());
        assert!(session.scene().widgets().is_empty());
        assert!(!session.delete_selected());
    }

    #[test]
    fn test_manual_publish_goes_through_outbox() {
        let mut session = session();
        assert!(session.publish_manual(" lab/cmd ", "go"));
        assert!(!session.publish_manual("lab/#", "go"));
        assert!(!session.publish_manual("", "go"));
        let outbox = session.take_outbox();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].topic, "lab/cmd");
        assert!(session.take_outbox().is_empty());
    }

    #[test]
    fn test_load_dashboard_resets_history_and_clamps() {
        let mut session = session();
        session.place_widget(WidgetType::Led, 0, 0);
        session.set_mode(Mode::Run);

        let mut dashboard = Dashboard::default();
        dashboard.project.base_topic = "lab".to_string();
        let mut registry_scene = Scene::new("lab");
        let registry = WidgetRegistry::default();
        let id = registry_scene
            .place_widget(&registry, WidgetType::Slider, 1, 1)
            .unwrap();
        let mut widget = registry_scene.get(id).unwrap().clone();
        widget.size = (0, 1);
        dashboard.widgets = vec![widget.clone(), widget];

        session.load_dashboard(dashboard);
        assert_eq!(session.mode(), Mode::Edit);
        assert!(!session.can_undo());
        assert_eq!(session.scene().widgets().len(), 2);
        assert_ne!(session.scene().widgets()[0].id, session.scene().widgets()[1].id);
        assert!(session.scene().widgets().iter().all(|w| w.size == (2, 2)));
        assert_eq!(session.renderer().len(), 2);

        let placed = session.place_widget(WidgetType::Text, 0, 0).unwrap();
        assert_eq!(session.scene().get(placed).unwrap().topic, "lab/text/1");
        assert_eq!(session.to_dashboard().widgets.len(), 3);
    }

    #[test]
    fn test_load_dashboard_makes_type_local_indices_unique() {
        let mut source = Scene::new("lab");
        let registry = WidgetRegistry::default();
        let mut led = |x| {
            let id = source.place_widget(&registry, WidgetType::Led, x, 0).unwrap();
            source.get(id).unwrap().clone()
        };
        let mut first = led(0);
        let mut second = led(4);
        let mut third = led(8);
        let mut fourth = led(12);
        first.type_local_index = 1;
        second.type_local_index = 1;
        third.type_local_index = 2;
        fourth.type_local_index = 0;
        let slider = {
            let id = source.place_widget(&registry, WidgetType::Slider, 0, 6).unwrap();
            source.get(id).unwrap().clone()
        };

        let mut dashboard = Dashboard::default();
        dashboard.widgets = vec![first, second, third, fourth, slider];
        let mut session = session();
        session.load_dashboard(dashboard);

        let indices: Vec<(WidgetType, u32)> = session
            .scene()
            .widgets()
            .iter()
            .map(|w| (w.type_tag, w.type_local_index))
            .collect();
        assert_eq!(
            indices,
            vec![
                (WidgetType::Led, 1),
                (WidgetType::Led, 3),
                (WidgetType::Led, 2),
                (WidgetType::Led, 4),
                (WidgetType::Slider, 1),
            ]
        );
        assert_eq!(session.scene().next_type_local_index(WidgetType::Led), 5);
    }

    #[test]
    fn test_revision_tracks_changes() {
        let mut session = session();
        let start = session.revision();
        let id = session.place_widget(WidgetType::Led, 0, 0).unwrap();
        assert_ne!(session.revision(), start);
        let placed = session.revision();
        session.select(None);
        session.select(Some(id));
        assert_eq!(session.revision(), placed);
    }
}
