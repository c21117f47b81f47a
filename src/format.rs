// 🧱 Address Formatter - SAO/PAO components and base address text
// Pure string construction; every downstream variant depends on this
// producing identical output for identical input

// ============================================================================
// JOINING
// ============================================================================

/// Join the non-empty parts with single spaces.
pub fn join_nonempty(parts: &[&str]) -> String {
    parts
        .iter()
        .copied()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// COMPONENT RENDERING
// ============================================================================

/// Render one addressable-object component (SAO or PAO).
///
/// Produces `TEXT`, `TEXT N[suffix]`, or `TEXT Nsfx-Nsfx` when both a
/// start and an end number are present. An end number without a start
/// number renders no numeric part at all.
pub fn format_component(
    text: &str,
    start_number: Option<i32>,
    start_suffix: &str,
    end_number: Option<i32>,
    end_suffix: &str,
) -> String {
    let range = match (start_number, end_number) {
        (Some(start), Some(end)) => format!(
            "{}{}-{}{}",
            start,
            start_suffix.trim(),
            end,
            end_suffix.trim()
        ),
        (Some(start), None) => format!("{}{}", start, start_suffix.trim()),
        (None, _) => String::new(),
    };

    join_nonempty(&[text.trim(), &range])
}

/// Assemble the full base address: combined SAO+PAO component string,
/// then street, locality, town, postcode, each omitted when empty.
pub fn format_base_address(
    sao: &str,
    pao: &str,
    street_description: &str,
    locality: &str,
    town_name: &str,
    postcode: &str,
) -> String {
    let premises = join_nonempty(&[sao.trim(), pao.trim()]);

    join_nonempty(&[
        &premises,
        street_description.trim(),
        locality.trim(),
        town_name.trim(),
        postcode.trim(),
    ])
}

// ============================================================================
// TESTS
// ============================================================================
