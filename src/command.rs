/// Text console commands
///
/// - One command per line: `<target> <command> [args...]`
/// - Targets are the scene name or an entity name; `demo` is routed by the demo loop
/// - Move commands take speeds in units per second, rotations take degrees
use std::fmt;

use crate::error::CommandError;
use crate::kernel::{EntityId, Scene, TransformSpace};
use crate::math::{Scalar, Vector3};

/// A parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub target: String,
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    pub fn new(target: &str, name: &str, args: &[&str]) -> Self {
        Self {
            target: target.to_string(),
            name: name.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }

    /// Parse one line. Blank lines and `#` comments yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let mut words = line.split_whitespace();
        let Some(target) = words.next() else {
            return Ok(None);
        };
        let name = words
            .next()
            .ok_or_else(|| CommandError::MissingCommand(target.to_string()))?;

        Ok(Some(Self {
            target: target.to_string(),
            name: name.to_string(),
            args: words.map(str::to_string).collect(),
        }))
    }

    /// Parse a whole script, keeping per-line failures
    pub fn parse_script(text: &str) -> Vec<Result<Self, CommandError>> {
        text.lines()
            .filter_map(|line| Self::parse(line).transpose())
            .collect()
    }

    fn unknown(&self) -> CommandError {
        CommandError::UnknownCommand {
            target: self.target.clone(),
            command: self.name.clone(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.target, self.name)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Console form of a command result
pub fn format_result(result: &Result<String, CommandError>) -> String {
    match result {
        Ok(output) => output.clone(),
        Err(err) => format!("Error: {}", err),
    }
}

/// Run `command` against the scene or one of its entities.
///
/// The scene name takes precedence; entities may not share it. `dt` is the
/// frame time used to scale move speeds.
pub fn execute(scene: &mut Scene, command: &Command, dt: Scalar) -> Result<String, CommandError> {
    if command.target == scene.name() {
        return execute_scene(scene, command);
    }
    let id = scene
        .find_entity(&command.target)
        .ok_or_else(|| CommandError::UnknownTarget(command.target.clone()))?;
    execute_entity(scene, id, command, dt)
}

pub fn execute_scene(scene: &mut Scene, command: &Command) -> Result<String, CommandError> {
    match command.name.as_str() {
        "save" => {
            let [path] = words::<1>(&command.args)?;
            scene.save_to_file(path)?;
            Ok(String::new())
        }
        "load" => {
            let [path] = words::<1>(&command.args)?;
            scene.load_from_file(path)?;
            Ok(String::new())
        }
        "tree" => Ok(scene.scene_graph_to_string()),
        "find" => {
            let [name] = words::<1>(&command.args)?;
            Ok(match scene.find_entity(name) {
                Some(id) => format!("{} = {:?}", name, id),
                None => format!("{} not found", name),
            })
        }
        "remove" => {
            let [name] = words::<1>(&command.args)?;
            let id = entity_named(scene, name)?;
            scene.remove_entity(id)?;
            Ok(String::new())
        }
        _ => Err(command.unknown()),
    }
}

pub fn execute_entity(
    scene: &mut Scene,
    id: EntityId,
    command: &Command,
    dt: Scalar,
) -> Result<String, CommandError> {
    let args = &command.args;
    let name = command.name.as_str();

    match name {
        "set" => return execute_set(scene, id, command),
        "print" => return Ok(scene.entity(id)?.to_string()),
        "tree" => return Ok(scene.entity(id)?.tree_to_string(0)),
        "add-child" => {
            let [child] = words::<1>(args)?;
            scene.entity_mut(id)?.add_child(child)?;
            return Ok(String::new());
        }
        "remove-child" => {
            let [child] = words::<1>(args)?;
            let child = entity_named(scene, child)?;
            scene.entity_mut(id)?.remove_child(child)?;
            return Ok(String::new());
        }
        "remove-all-children" => {
            let removed = scene.entity_mut(id)?.remove_all_children()?;
            return Ok(format!("removed {} children", removed));
        }
        "reparent" => {
            let [parent] = words::<1>(args)?;
            let parent = entity_named(scene, parent)?;
            scene.entity_mut(id)?.reparent(parent)?;
            return Ok(String::new());
        }
        "look-at" => {
            // an up vector is all three components or none
            let up = if args.len() > 3 {
                let [_, _, _, x, y, z] = numbers::<6>(args)?;
                Vector3::new(x, y, z)
            } else {
                Vector3::UNIT_Y
            };
            let [x, y, z] = numbers::<3>(args)?;
            scene.entity_mut(id)?.look_at(Vector3::new(x, y, z), up)?;
            return Ok(String::new());
        }
        _ => {}
    }

    let (base, space) = split_space(name);
    let mut entity = scene.entity_mut(id)?;
    match base {
        "move-xyz" => {
            let [x, y, z] = numbers::<3>(args)?;
            entity.translate(Vector3::new(x, y, z) * dt, space)?;
        }
        "move-x" => {
            let [speed] = numbers::<1>(args)?;
            entity.translate_x(speed * dt, space)?;
        }
        "move-y" => {
            let [speed] = numbers::<1>(args)?;
            entity.translate_y(speed * dt, space)?;
        }
        "move-z" => {
            let [speed] = numbers::<1>(args)?;
            entity.translate_z(speed * dt, space)?;
        }
        "yaw" => {
            let [degrees] = numbers::<1>(args)?;
            entity.yaw(degrees.to_radians(), space)?;
        }
        "pitch" => {
            let [degrees] = numbers::<1>(args)?;
            entity.pitch(degrees.to_radians(), space)?;
        }
        "roll" => {
            let [degrees] = numbers::<1>(args)?;
            entity.roll(degrees.to_radians(), space)?;
        }
        _ => return Err(command.unknown()),
    }
    Ok(String::new())
}

/// `set position-abs|position-rel x y z` and
/// `set orientation-abs|orientation-rel yaw pitch roll` (degrees)
fn execute_set(scene: &mut Scene, id: EntityId, command: &Command) -> Result<String, CommandError> {
    let Some((property, rest)) = command.args.split_first() else {
        return Err(CommandError::TooFewArguments { expected: 4, got: 0 });
    };
    let [a, b, c] = numbers::<3>(rest).map_err(|err| match err {
        CommandError::TooFewArguments { got, .. } => CommandError::TooFewArguments {
            expected: 4,
            got: got + 1,
        },
        err => err,
    })?;

    let mut entity = scene.entity_mut(id)?;
    match property.as_str() {
        "position-abs" => entity.set_position_abs(Vector3::new(a, b, c))?,
        "position-rel" => entity.set_position_rel(Vector3::new(a, b, c))?,
        "orientation-abs" => {
            entity.set_orientation_abs_ypr(a.to_radians(), b.to_radians(), c.to_radians())?
        }
        "orientation-rel" => {
            entity.set_orientation_rel_ypr(a.to_radians(), b.to_radians(), c.to_radians())?
        }
        other => {
            return Err(CommandError::UnknownCommand {
                target: command.target.clone(),
                command: format!("set {}", other),
            })
        }
    };
    Ok(String::new())
}

/// `yaw-global` -> (`yaw`, Global); no suffix means local space
fn split_space(name: &str) -> (&str, TransformSpace) {
    if let Some(base) = name.strip_suffix("-parent") {
        (base, TransformSpace::Parent)
    } else if let Some(base) = name.strip_suffix("-global") {
        (base, TransformSpace::Global)
    } else {
        (name, TransformSpace::Local)
    }
}

fn entity_named(scene: &Scene, name: &str) -> Result<EntityId, CommandError> {
    scene
        .find_entity(name)
        .ok_or_else(|| CommandError::UnknownTarget(name.to_string()))
}

/// First `N` arguments; extra arguments are ignored
pub(crate) fn words<const N: usize>(args: &[String]) -> Result<[&str; N], CommandError> {
    if args.len() < N {
        return Err(CommandError::TooFewArguments {
            expected: N,
            got: args.len(),
        });
    }
    Ok(std::array::from_fn(|i| args[i].as_str()))
}

pub(crate) fn numbers<const N: usize>(args: &[String]) -> Result<[Scalar; N], CommandError> {
    let words = words::<N>(args)?;
    let mut values = [0.0; N];
    for (value, word) in values.iter_mut().zip(words) {
        *value = word
            .parse()
            .map_err(|_| CommandError::InvalidNumber(word.to_string()))?;
    }
    Ok(values)
}
