//! Prompt templates sent to the text model.

/// Style names used when the naming call fails or returns fewer than three names.
pub const FALLBACK_STYLE_NAMES: [&str; 3] = [
    "AiSim Primary Pigment Gridwork",
    "AiSim Tactile Risograph Layering",
    "AiSim Kinetic Silhouette Balance",
];

/// Built-in prompt ideas, shown before dynamic ones arrive.
pub const INITIAL_PLACEHOLDERS: &[&str] = &[
    "bioluminescent task list",
    "brutalist weather dashboard",
    "origami music player",
    "letterpress recipe card",
    "holographic crypto wallet",
    "terrazzo calendar widget",
    "neon arcade leaderboard",
    "botanical habit tracker",
    "blueprint project timeline",
    "chalkboard pricing table",
];

pub const PLACEHOLDER_PROMPT: &str = "Generate 20 creative, short, diverse UI component prompts \
(e.g. \"bioluminescent task list\"). Return ONLY a raw JSON array of strings. \
IP SAFEGUARD: Avoid referencing specific famous artists, movies, or brands.";

/// Ask for three branded design-direction names for `prompt`, as a JSON array.
pub fn style_names_prompt(prompt: &str) -> String {
    format!(
        r#"Generate 3 distinct, highly evocative design directions for: "{prompt}".

**STRICT IP SAFEGUARD:**
Never use artist or brand names. Use physical and material metaphors.

**CREATIVE EXAMPLES (Do not simply copy these, use them as a guide for tone):**
- Example A: "AiSim Asymmetrical Rectilinear Blockwork" (Grid-heavy, primary pigments, thick structural strokes, functionalist vibe).
- Example B: "AiSim Grainy Risograph Layering" (Tactile paper texture, overprinted translucent inks, dithered gradients).
- Example C: "AiSim Kinetic Wireframe Suspension" (Floating silhouettes, thin balancing lines, organic primary shapes).
- Example D: "AiSim Spectral Prismatic Diffusion" (Glassmorphism, caustic refraction, soft-focus morphing gradients).

**GOAL:**
Return ONLY a raw JSON array of 3 *NEW*, creative names for these directions. Each name MUST start with "AiSim " followed by the design direction (e.g. ["AiSim Tactile Risograph Press", "AiSim Kinetic Silhouette Balance", "AiSim Primary Pigment Gridwork"])."#
    )
}

/// Ask for one raw HTML document for `prompt` in the given design direction.
pub fn artifact_prompt(prompt: &str, style: &str) -> String {
    format!(
        r#"You are Flash UI. Create a stunning, high-fidelity UI component for: "{prompt}".

**CONCEPTUAL DIRECTION: {style}**

**VISUAL EXECUTION RULES:**
1. **Materiality**: Use the specified metaphor to drive every CSS choice. (e.g. if Risograph, use `feTurbulence` for grain and `mix-blend-mode: multiply` for ink layering).
2. **Typography**: Use high-quality web fonts. Pair a bold sans-serif with a refined monospace for data.
3. **Motion**: Include subtle, high-performance CSS/JS animations (hover transitions, entry reveals).
4. **IP SAFEGUARD**: No artist names or trademarks.
5. **Layout**: Be bold with negative space and hierarchy. Avoid generic cards.

Return ONLY RAW HTML. No markdown fences."#
    )
}

/// Ask for three `{name, html}` objects, one per line.
pub fn variations_prompt(prompt: &str) -> String {
    format!(
        r#"You are a master UI/UX designer. Generate 3 RADICAL CONCEPTUAL VARIATIONS of: "{prompt}".

**STRICT IP SAFEGUARD:**
No names of artists.
Instead, describe the *Physicality* and *Material Logic* of the UI.

**CREATIVE GUIDANCE (Use these as EXAMPLES of how to describe style, but INVENT YOUR OWN):**
1. Example: "AiSim Asymmetrical Primary Grid" (Heavy black strokes, rectilinear structure, flat primary pigments, high-contrast white space).
2. Example: "AiSim Suspended Kinetic Mobile" (Delicate wire-thin connections, floating organic primary shapes, slow-motion balance, white-void background).
3. Example: "AiSim Grainy Risograph Press" (Overprinted translucent inks, dithered grain textures, monochromatic color depth, raw paper substrate).
4. Example: "AiSim Volumetric Spectral Fluid" (Generative morphing gradients, soft-focus diffusion, bioluminescent light sources, spectral chromatic aberration).

**YOUR TASK:**
For EACH variation:
- Invent a unique design persona name based on a NEW physical metaphor. Each name MUST start with "AiSim ".
- Rewrite the prompt to fully adopt that metaphor's visual language.
- Generate high-fidelity HTML/CSS.

Required JSON Output Format (stream ONE object per line):
`{{ "name": "AiSim Persona Name", "html": "..." }}`"#
    )
}
