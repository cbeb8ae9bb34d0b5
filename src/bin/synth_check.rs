// Diagnostic binary: run the analyzer over signals with known key and tempo

use stem_analyzer::audio::{
    synth, types::TARGET_SAMPLE_RATE, AnalysisConfig, AudioAnalyzer, AudioData,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("Stem Analyzer synthetic signal check");

    let cases = [
        ("C major triad, 120 BPM clicks", synth::C_MAJOR_TRIAD, 120.0),
        ("A minor triad, 95 BPM clicks", synth::A_MINOR_TRIAD, 95.0),
    ];

    for (label, chord, bpm) in cases {
        println!("\n{}", label);
        let samples = synth::mix(
            &synth::click_track(bpm, 10.0, TARGET_SAMPLE_RATE),
            &synth::chord(&chord, 10.0, TARGET_SAMPLE_RATE, 0.15),
        );
        let audio = AudioData::from_samples(samples, TARGET_SAMPLE_RATE);

        for (name, config) in [
            ("default", AnalysisConfig::default()),
            ("fast", AnalysisConfig::fast()),
        ] {
            let analyzer = AudioAnalyzer::with_config(config);
            let key = analyzer.detect_key(&audio)?;
            let tempo = analyzer.detect_bpm(&audio)?;
            let info = analyzer.additional_info(&audio)?;

            println!("  [{}]", name);
            println!("    Key: {} (confidence {:.3})", key, key.confidence);
            println!(
                "    BPM: {:.2} (expected {:.0}; primary {:.2}, harmonic median {:.2}, third {})",
                tempo.bpm,
                bpm,
                tempo.primary,
                tempo.harmonic_median,
                tempo
                    .third_median
                    .map(|t| format!("{:.2}", t))
                    .unwrap_or_else(|| "-".to_string())
            );
            for (descriptor, value) in info.to_map() {
                println!("    {}: {:.4}", descriptor, value);
            }
        }
    }

    Ok(())
}
