/// Clocked behaviour shared by every component of the model.
///
/// Inputs for a tick are staged through component-specific methods first; `tick_one` then
/// evaluates the tick from the previously committed state and commits the result atomically.
pub trait ModuleBehaviors {
    fn tick_one(&mut self);
    fn reset(&mut self);
}
