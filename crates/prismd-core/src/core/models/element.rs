use phf::phf_map;

/// Standard atomic masses (u) for the elements the bundled potentials cover.
static ATOMIC_MASSES: phf::Map<&'static str, f64> = phf_map! {
    "H" => 1.008,
    "He" => 4.002602,
    "Li" => 6.94,
    "Be" => 9.0121831,
    "B" => 10.81,
    "C" => 12.011,
    "N" => 14.007,
    "O" => 15.999,
    "F" => 18.998403163,
    "Ne" => 20.1797,
    "Na" => 22.98976928,
    "Mg" => 24.305,
    "Al" => 26.9815385,
    "Si" => 28.085,
    "P" => 30.973761998,
    "S" => 32.06,
    "Cl" => 35.45,
    "Ar" => 39.948,
    "K" => 39.0983,
    "Ca" => 40.078,
    "Ti" => 47.867,
    "V" => 50.9415,
    "Cr" => 51.9961,
    "Mn" => 54.938044,
    "Fe" => 55.845,
    "Co" => 58.933194,
    "Ni" => 58.6934,
    "Cu" => 63.546,
    "Zn" => 65.38,
    "Ga" => 69.723,
    "Ge" => 72.63,
    "Zr" => 91.224,
    "Nb" => 92.90637,
    "Mo" => 95.95,
    "Pd" => 106.42,
    "Ag" => 107.8682,
    "Cd" => 112.414,
    "Sn" => 118.71,
    "W" => 183.84,
    "Pt" => 195.084,
    "Au" => 196.966569,
    "Pb" => 207.2,
};

/// Looks up the standard atomic mass for an element symbol.
pub fn atomic_mass(symbol: &str) -> Option<f64> {
    ATOMIC_MASSES.get(symbol).copied()
}
