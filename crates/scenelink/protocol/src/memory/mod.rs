//! Headless viewer facade
//!
//! Keeps a scene model good enough to drive the protocol end to end: PDB
//! coordinates, a default preset, a trivial selection language, and rhai
//! scripting. Internal keys are `cell-N` and every rebuilt representation gets a
//! fresh object handle, the way a rendering engine recreates its objects.

mod pdb;
mod script;
mod selection;

pub use script::{ScriptCommand, ScriptHost, ScriptOutcome};

use crate::error::{ViewerError, ViewerResult};
use crate::types::{AtomRecord, Granularity, Rgb, StructureFormat};
use crate::viewer::ViewerFacade;
use async_trait::async_trait;
use pdb::{Atom, AtomGroup};
use rhai::Dynamic;
use scenelink_registry::{
    InternalKey, LiveComponent, LiveRepresentation, LiveStructure, ObjectHandle,
};
use selection::Expression;
use std::collections::BTreeSet;

/// Label given to components created from a selection
pub const SELECTION_COMPONENT: &str = "selection-by-script";

#[derive(Debug, Clone)]
struct ViewRepresentation {
    key: InternalKey,
    style: String,
    object: ObjectHandle,
}

#[derive(Debug, Clone)]
struct ViewComponent {
    key: InternalKey,
    group_key: String,
    object: ObjectHandle,
    atoms: Vec<usize>,
    representations: Vec<ViewRepresentation>,
}

#[derive(Debug, Clone)]
struct ViewStructure {
    reference_key: InternalKey,
    key: InternalKey,
    label: String,
    data_id: String,
    object: ObjectHandle,
    atoms: Vec<Atom>,
    components: Vec<ViewComponent>,
    /// Overpaint layers, applied in order
    colors: Vec<(Vec<usize>, Rgb)>,
}

/// Where the camera points
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum Camera {
    #[default]
    Home,
    Focused {
        center: [f32; 3],
        atoms: usize,
    },
}

#[derive(Debug, Default)]
pub struct InMemoryViewer {
    structures: Vec<ViewStructure>,
    /// Selected atom indices per structure position
    selection: Vec<BTreeSet<usize>>,
    camera: Camera,
    granularity: Granularity,
    selecting: bool,
    next_cell: u64,
    next_object: u64,
    scripts: ScriptHost,
}

impl InMemoryViewer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn camera(&self) -> Camera {
        self.camera
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn is_selecting(&self) -> bool {
        self.selecting
    }

    pub fn structure_count(&self) -> usize {
        self.structures.len()
    }

    /// Number of selected atoms across all structures
    pub fn selection_size(&self) -> usize {
        self.selection.iter().map(BTreeSet::len).sum()
    }

    /// Color painted last over the atom with `serial` in structure `index`
    pub fn color_of(&self, index: usize, serial: i64) -> Option<Rgb> {
        let structure = self.structures.get(index)?;
        let atom = structure.atoms.iter().position(|a| a.serial == serial)?;
        structure
            .colors
            .iter()
            .rev()
            .find(|(atoms, _)| atoms.contains(&atom))
            .map(|(_, rgb)| *rgb)
    }

    fn cell(&mut self) -> InternalKey {
        self.next_cell += 1;
        InternalKey::new(format!("cell-{}", self.next_cell))
    }

    fn object(&mut self) -> ObjectHandle {
        self.next_object += 1;
        ObjectHandle::new(self.next_object)
    }

    /// Give every representation of a structure a new engine object
    fn rebuild_representations(&mut self, index: usize) {
        let mut next = self.next_object;
        if let Some(structure) = self.structures.get_mut(index) {
            for representation in structure
                .components
                .iter_mut()
                .flat_map(|c| c.representations.iter_mut())
            {
                next += 1;
                representation.object = ObjectHandle::new(next);
            }
        }
        self.next_object = next;
    }

    /// Positions of structures that have a non-empty selection
    fn selected_structures(&self) -> Vec<usize> {
        self.selection
            .iter()
            .enumerate()
            .filter(|(_, atoms)| !atoms.is_empty())
            .map(|(index, _)| index)
            .collect()
    }

    fn single_selected_structure(&self) -> ViewerResult<usize> {
        match self.selected_structures().as_slice() {
            [] => Err(ViewerError::EmptySelection),
            [only] => Ok(*only),
            many => Err(ViewerError::MultipleStructuresSelected(many.len())),
        }
    }

    /// Run the facade actions a script queued, stopping at the first failure
    fn apply_script(&mut self, outcome: ScriptOutcome) -> ViewerResult<serde_json::Value> {
        for command in outcome.commands {
            tracing::debug!(?command, "Applying script command");
            match command {
                ScriptCommand::Select(expression) => self.select_from_expression(&expression)?,
                ScriptCommand::ClearSelection => self.clear_selection()?,
                ScriptCommand::Focus => self.focus_selection()?,
                ScriptCommand::ResetView => self.reset_view()?,
                ScriptCommand::SetGranularity(granularity) => {
                    self.set_picking_granularity(granularity)?
                }
            }
        }
        Ok(outcome.value)
    }

    /// Scene description handed to scripts
    fn script_view(&self) -> rhai::Map {
        let structures: rhai::Array = self
            .structures
            .iter()
            .enumerate()
            .map(|(index, structure)| {
                let components: rhai::Array = structure
                    .components
                    .iter()
                    .map(|component| {
                        let mut map = rhai::Map::new();
                        map.insert("group".into(), Dynamic::from(component.group_key.clone()));
                        map.insert("atoms".into(), Dynamic::from(component.atoms.len() as i64));
                        let styles: rhai::Array = component
                            .representations
                            .iter()
                            .map(|r| Dynamic::from(r.style.clone()))
                            .collect();
                        map.insert("representations".into(), Dynamic::from_array(styles));
                        Dynamic::from_map(map)
                    })
                    .collect();

                let mut map = rhai::Map::new();
                map.insert("label".into(), Dynamic::from(structure.label.clone()));
                map.insert("data_id".into(), Dynamic::from(structure.data_id.clone()));
                map.insert("atoms".into(), Dynamic::from(structure.atoms.len() as i64));
                map.insert(
                    "selected".into(),
                    Dynamic::from(self.selection.get(index).map_or(0, BTreeSet::len) as i64),
                );
                map.insert("components".into(), Dynamic::from_array(components));
                Dynamic::from_map(map)
            })
            .collect();

        let mut view = rhai::Map::new();
        view.insert("structures".into(), Dynamic::from_array(structures));
        view.insert("selected".into(), Dynamic::from(self.selection_size() as i64));
        view.insert("selecting".into(), Dynamic::from(self.selecting));
        view.insert("granularity".into(), Dynamic::from(self.granularity.to_string()));
        view.insert(
            "focused".into(),
            Dynamic::from(matches!(self.camera, Camera::Focused { .. })),
        );
        view
    }
}

#[async_trait]
impl ViewerFacade for InMemoryViewer {
    async fn load_structure(
        &mut self,
        text: &str,
        format: StructureFormat,
        label: &str,
    ) -> ViewerResult<()> {
        if format != StructureFormat::Pdb {
            return Err(ViewerError::Unsupported(format!("{format} input")));
        }
        let atoms = pdb::parse(text)?;

        let reference_key = self.cell();
        let key = self.cell();
        let object = self.object();

        let mut groups: Vec<AtomGroup> = atoms.iter().map(Atom::group).collect();
        groups.sort();
        groups.dedup();

        let mut components = Vec::new();
        for group in groups {
            let members = atoms
                .iter()
                .enumerate()
                .filter(|(_, atom)| atom.group() == group)
                .map(|(index, _)| index)
                .collect();
            let representation = ViewRepresentation {
                key: self.cell(),
                style: group.default_style().to_string(),
                object: self.object(),
            };
            components.push(ViewComponent {
                key: self.cell(),
                group_key: group.key().to_string(),
                object: self.object(),
                atoms: members,
                representations: vec![representation],
            });
        }

        tracing::debug!(label, atoms = atoms.len(), components = components.len(), "Parsed structure");
        self.structures.push(ViewStructure {
            reference_key,
            data_id: format!("{label}-{}", key.as_str()),
            key,
            label: label.to_string(),
            object,
            atoms,
            components,
            colors: Vec::new(),
        });
        self.selection.push(BTreeSet::new());
        Ok(())
    }

    fn live_hierarchy(&self) -> Vec<LiveStructure> {
        self.structures
            .iter()
            .map(|structure| LiveStructure {
                reference_key: structure.reference_key.clone(),
                key: structure.key.clone(),
                data_id: Some(structure.data_id.clone()),
                object: structure.object,
                components: structure
                    .components
                    .iter()
                    .map(|component| LiveComponent {
                        key: component.key.clone(),
                        group_key: component.group_key.clone(),
                        object: component.object,
                        representations: component
                            .representations
                            .iter()
                            .map(|representation| LiveRepresentation {
                                key: representation.key.clone(),
                                name: representation.style.clone(),
                                object: representation.object,
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect()
    }

    fn selected_atoms(&self) -> ViewerResult<Vec<AtomRecord>> {
        let index = self.single_selected_structure()?;
        let structure = &self.structures[index];
        Ok(self.selection[index]
            .iter()
            .filter_map(|atom| structure.atoms.get(*atom))
            .map(Atom::record)
            .collect())
    }

    fn select_from_expression(&mut self, expression: &str) -> ViewerResult<()> {
        let expression = Expression::parse(expression)?;
        for (structure, selected) in self.structures.iter().zip(self.selection.iter_mut()) {
            *selected = structure
                .atoms
                .iter()
                .enumerate()
                .filter(|(_, atom)| expression.matches(atom))
                .map(|(index, _)| index)
                .collect();
        }
        Ok(())
    }

    fn clear_selection(&mut self) -> ViewerResult<()> {
        self.selection.iter_mut().for_each(BTreeSet::clear);
        Ok(())
    }

    fn clear_all(&mut self) -> ViewerResult<()> {
        self.structures.clear();
        self.selection.clear();
        self.camera = Camera::Home;
        self.selecting = false;
        Ok(())
    }

    fn set_color(&mut self, color: Rgb) -> ViewerResult<()> {
        let index = self.single_selected_structure()?;
        let atoms: Vec<usize> = self.selection[index].iter().copied().collect();
        self.structures[index].colors.push((atoms, color));
        self.rebuild_representations(index);
        Ok(())
    }

    async fn add_representation(&mut self, style: &str) -> ViewerResult<()> {
        let index = self.single_selected_structure()?;
        let atoms: Vec<usize> = self.selection[index].iter().copied().collect();
        let representation = ViewRepresentation {
            key: self.cell(),
            style: style.to_string(),
            object: self.object(),
        };
        let component = ViewComponent {
            key: self.cell(),
            group_key: SELECTION_COMPONENT.to_string(),
            object: self.object(),
            atoms,
            representations: vec![representation],
        };
        self.structures[index].components.push(component);
        self.rebuild_representations(index);
        Ok(())
    }

    fn set_picking_granularity(&mut self, granularity: Granularity) -> ViewerResult<()> {
        self.granularity = granularity;
        Ok(())
    }

    fn focus_selection(&mut self) -> ViewerResult<()> {
        let mut sum = [0.0_f32; 3];
        let mut count = 0;
        for (structure, selected) in self.structures.iter().zip(&self.selection) {
            for atom in selected.iter().filter_map(|i| structure.atoms.get(*i)) {
                for (total, value) in sum.iter_mut().zip(atom.position) {
                    *total += value;
                }
                count += 1;
            }
        }
        if count > 0 {
            let center = sum.map(|total| total / count as f32);
            self.camera = Camera::Focused {
                center,
                atoms: count,
            };
        }
        Ok(())
    }

    fn reset_view(&mut self) -> ViewerResult<()> {
        self.camera = Camera::Home;
        Ok(())
    }

    fn toggle_selection_mode(&mut self, selecting: bool) -> ViewerResult<()> {
        self.selecting = selecting;
        Ok(())
    }

    fn run_script(&mut self, script: &str) -> ViewerResult<serde_json::Value> {
        let outcome = self.scripts.eval(script, self.script_view())?;
        self.apply_script(outcome)
    }

    async fn run_script_async(&mut self, script: &str) -> ViewerResult<serde_json::Value> {
        let view = self.script_view();
        let outcome = self.scripts.eval_async(script.to_string(), view).await?;
        self.apply_script(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdb::SAMPLE;

    async fn loaded() -> InMemoryViewer {
        let mut viewer = InMemoryViewer::new();
        viewer
            .load_structure(SAMPLE, StructureFormat::Pdb, "crambin")
            .await
            .unwrap();
        viewer
    }

    #[tokio::test]
    async fn load_builds_default_preset() {
        let viewer = loaded().await;
        let hierarchy = viewer.live_hierarchy();
        assert_eq!(hierarchy.len(), 1);

        let components: Vec<(&str, &str)> = hierarchy[0]
            .components
            .iter()
            .map(|c| (c.group_key.as_str(), c.representations[0].name.as_str()))
            .collect();
        assert_eq!(
            components,
            [
                ("polymer", "cartoon"),
                ("ligand", "ball-and-stick"),
                ("water", "ball-and-stick"),
            ]
        );
        assert_ne!(hierarchy[0].reference_key, hierarchy[0].key);
    }

    #[tokio::test]
    async fn rejects_unsupported_formats() {
        let mut viewer = InMemoryViewer::new();
        let err = viewer
            .load_structure("data_1crn", StructureFormat::Mmcif, "x")
            .await
            .unwrap_err();
        assert!(matches!(err, ViewerError::Unsupported(_)));
        assert_eq!(viewer.structure_count(), 0);
    }

    #[tokio::test]
    async fn selection_requires_exactly_one_structure() {
        let mut viewer = loaded().await;
        assert_eq!(viewer.selected_atoms().unwrap_err(), ViewerError::EmptySelection);

        viewer.select_from_expression("chain A").unwrap();
        let atoms = viewer.selected_atoms().unwrap();
        assert_eq!(atoms.iter().map(|a| a.id).collect::<Vec<_>>(), [1, 2, 3]);

        viewer
            .load_structure(SAMPLE, StructureFormat::Pdb, "copy")
            .await
            .unwrap();
        viewer.select_from_expression("chain A").unwrap();
        assert_eq!(
            viewer.selected_atoms().unwrap_err(),
            ViewerError::MultipleStructuresSelected(2)
        );
    }

    #[tokio::test]
    async fn add_representation_rebuilds_existing_objects() {
        let mut viewer = loaded().await;
        let before = viewer.live_hierarchy();

        viewer.select_from_expression("resn LIG").unwrap();
        viewer.add_representation("cartoon").await.unwrap();
        let after = viewer.live_hierarchy();

        assert_eq!(after[0].components.len(), 4);
        let added = &after[0].components[3];
        assert_eq!(added.group_key, SELECTION_COMPONENT);
        assert_eq!(added.representations[0].name, "cartoon");

        let old = &before[0].components[0].representations[0];
        let new = &after[0].components[0].representations[0];
        assert_eq!(old.key, new.key);
        assert_ne!(old.object, new.object);
        assert_eq!(after[0].object, before[0].object);
    }

    #[tokio::test]
    async fn add_representation_refuses_multiple_structures() {
        let mut viewer = loaded().await;
        viewer
            .load_structure(SAMPLE, StructureFormat::Pdb, "copy")
            .await
            .unwrap();
        viewer.select_from_expression("all").unwrap();

        assert_eq!(
            viewer.add_representation("cartoon").await.unwrap_err(),
            ViewerError::MultipleStructuresSelected(2)
        );
        let hierarchy = viewer.live_hierarchy();
        assert!(hierarchy.iter().all(|s| s.components.len() == 3));
    }

    #[tokio::test]
    async fn add_representation_needs_selection() {
        let mut viewer = loaded().await;
        assert_eq!(
            viewer.add_representation("cartoon").await.unwrap_err(),
            ViewerError::EmptySelection
        );
    }

    #[tokio::test]
    async fn set_color_paints_selected_atoms() {
        let mut viewer = loaded().await;
        viewer.select_from_expression("chain B").unwrap();
        viewer.set_color(Rgb::new(255, 0, 0)).unwrap();

        assert_eq!(viewer.color_of(0, 4), Some(Rgb::new(255, 0, 0)));
        assert_eq!(viewer.color_of(0, 1), None);
    }

    #[tokio::test]
    async fn focus_centers_on_selection() {
        let mut viewer = loaded().await;
        viewer.focus_selection().unwrap();
        assert_eq!(viewer.camera(), Camera::Home);

        viewer.select_from_expression("resi 101-201").unwrap();
        viewer.focus_selection().unwrap();
        assert_eq!(
            viewer.camera(),
            Camera::Focused {
                center: [11.5, 11.5, 11.5],
                atoms: 2,
            }
        );

        viewer.reset_view().unwrap();
        assert_eq!(viewer.camera(), Camera::Home);
    }

    #[tokio::test]
    async fn scripts_see_the_scene() {
        let mut viewer = loaded().await;
        viewer.select_from_expression("all").unwrap();
        let value = viewer
            .run_script("viewer.structures[0].atoms + viewer.selected")
            .unwrap();
        assert_eq!(value, serde_json::json!(12));

        let value = viewer
            .run_script_async("viewer.structures[0].components.len()")
            .await
            .unwrap();
        assert_eq!(value, serde_json::json!(3));
    }

    #[tokio::test]
    async fn scripts_drive_the_facade() {
        let mut viewer = loaded().await;
        let value = viewer
            .run_script(r#"select("resi 101-201"); focus(); set_granularity("residue"); viewer.selected"#)
            .unwrap();
        // The view describes the scene as it was before the script ran.
        assert_eq!(value, serde_json::json!(0));
        assert_eq!(viewer.selection_size(), 2);
        assert!(matches!(viewer.camera(), Camera::Focused { atoms: 2, .. }));
        assert_eq!(viewer.granularity(), Granularity::Residue);

        viewer
            .run_script_async("clear_selection(); reset_view();")
            .await
            .unwrap();
        assert_eq!(viewer.selection_size(), 0);
        assert_eq!(viewer.camera(), Camera::Home);
    }

    #[tokio::test]
    async fn failed_scripts_apply_nothing() {
        let mut viewer = loaded().await;
        let err = viewer
            .run_script(r#"select("all"); throw "stop";"#)
            .unwrap_err();
        assert!(matches!(err, ViewerError::Script(_)));
        assert_eq!(viewer.selection_size(), 0);

        assert!(viewer.run_script(r#"select("bogus ~")"#).is_err());
    }

    #[tokio::test]
    async fn clear_all_empties_the_scene() {
        let mut viewer = loaded().await;
        viewer.select_from_expression("all").unwrap();
        viewer.clear_all().unwrap();
        assert_eq!(viewer.structure_count(), 0);
        assert_eq!(viewer.selection_size(), 0);
        assert!(viewer.live_hierarchy().is_empty());
    }
}
