use clap::Subcommand;
use stride_core::Consumable;

use super::context;

#[derive(Subcommand)]
pub enum BoostAction {
    /// Arm the Energy Bar: +15% on the next scored session
    EnergyBar,
    /// Arm the Compass: +25 Steps on the next focused to-do completion
    Compass,
}

pub fn run(action: BoostAction) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = context()?;
    let consumable = match action {
        BoostAction::EnergyBar => Consumable::EnergyBar,
        BoostAction::Compass => Consumable::Compass,
    };

    ctx.engine.arm_consumable(ctx.user, consumable)?;
    println!("{} armed", consumable.label());
    Ok(())
}
