//! Recipe data consumed by the orchestrator.

use barbot_config::PORT_COUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngredientType {
    Spirit,
    Juice,
    Sirup,
    Other,
    /// Not a liquid: run the stirrer.
    Stirr,
    /// Dispensed by the sugar unit, amount in recipe units.
    Sugar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ingredient {
    pub identifier: String,
    pub name: String,
    pub kind: IngredientType,
    /// g per ml
    pub density: f32,
}

impl Ingredient {
    pub fn new(identifier: impl Into<String>, name: impl Into<String>, kind: IngredientType) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
            kind,
            density: 1.0,
        }
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecipeItem {
    pub ingredient: Ingredient,
    /// cl for liquids, units for sugar
    pub amount: f32,
}

impl RecipeItem {
    pub fn new(ingredient: Ingredient, amount: f32) -> Self {
        Self { ingredient, amount }
    }

    /// Weight to dispense for a liquid, in whole g (`amount` cl).
    pub fn liquid_weight(&self) -> u32 {
        grams(self.amount * self.ingredient.density * 10.0)
    }

    /// Weight to dispense for sugar, in g.
    pub fn sugar_weight(&self, sugar_per_unit: u32) -> u32 {
        grams(self.amount * sugar_per_unit as f32)
    }
}

fn grams(v: f32) -> u32 {
    if v.is_finite() && v > 0.0 {
        v.round() as u32
    } else {
        0
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Recipe {
    pub name: String,
    pub items: Vec<RecipeItem>,
}

/// Which ingredient is connected to which pump port.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortConfiguration {
    ports: [Option<String>; PORT_COUNT as usize],
}

impl PortConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `identifier` to `port`; returns false when the port does not exist.
    pub fn set(&mut self, port: u8, identifier: impl Into<String>) -> bool {
        match self.ports.get_mut(usize::from(port)) {
            Some(slot) => {
                *slot = Some(identifier.into());
                true
            }
            None => false,
        }
    }

    pub fn port_of_ingredient(&self, ingredient: &Ingredient) -> Option<u8> {
        self.ports
            .iter()
            .position(|p| p.as_deref() == Some(ingredient.identifier.as_str()))
            .and_then(|i| u8::try_from(i).ok())
    }

    pub fn ingredient_at(&self, port: u8) -> Option<&str> {
        self.ports.get(usize::from(port)).and_then(|p| p.as_deref())
    }

    /// Ports with an ingredient assigned, ascending.
    pub fn occupied(&self) -> Vec<u8> {
        (0..PORT_COUNT)
            .filter(|p| self.ingredient_at(*p).is_some())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MixingOptions {
    pub recipe: Recipe,
    /// `None` asks the user, if a crusher is configured.
    pub add_ice: Option<bool>,
    /// `None` asks the user, if a straw dispenser is configured.
    pub add_straw: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights() {
        let sirup = Ingredient::new("g", "Grenadine", IngredientType::Sirup).with_density(1.3);
        assert_eq!(RecipeItem::new(sirup, 2.0).liquid_weight(), 26);
        let sugar = Ingredient::new("s", "Sugar", IngredientType::Sugar);
        assert_eq!(RecipeItem::new(sugar, 2.5).sugar_weight(4), 10);
        let neg = Ingredient::new("x", "X", IngredientType::Other);
        assert_eq!(RecipeItem::new(neg, -1.0).liquid_weight(), 0);
    }

    #[test]
    fn port_lookup() {
        let mut ports = PortConfiguration::new();
        assert!(ports.set(4, "rum"));
        assert!(!ports.set(12, "gin"));
        let rum = Ingredient::new("rum", "Rum", IngredientType::Spirit);
        let gin = Ingredient::new("gin", "Gin", IngredientType::Spirit);
        assert_eq!(ports.port_of_ingredient(&rum), Some(4));
        assert_eq!(ports.port_of_ingredient(&gin), None);
        assert_eq!(ports.occupied(), vec![4]);
    }
}
