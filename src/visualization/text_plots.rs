use crate::metrics::TrainingReport;

/// Render a series as an ASCII scatter plot.
pub fn plot_series(values: &[f32], title: &str, width: usize, height: usize) -> String {
    if values.is_empty() || width < 10 || height < 5 {
        return format!("{}: Invalid data or dimensions", title);
    }

    let min_val = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max_val = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    if (max_val - min_val).abs() < f32::EPSILON {
        return format!("{}: All values are {:.4}", title, min_val);
    }

    let mut plot = vec![vec![' '; width]; height];

    // Add axes
    for row in plot.iter_mut() {
        row[0] = '|';
    }
    for cell in plot[height - 1].iter_mut() {
        *cell = '-';
    }
    plot[height - 1][0] = '+';

    let x_span = (width - 3) as f32;
    let y_scale = (height - 3) as f32 / (max_val - min_val);
    let last_index = (values.len() - 1).max(1) as f32;

    for (i, &value) in values.iter().enumerate() {
        let x = ((i as f32 / last_index * x_span) as usize + 2).min(width - 1);
        let offset = ((value - min_val) * y_scale) as usize;
        let y = (height - 3).saturating_sub(offset).min(height - 2);
        plot[y][x] = '*';
    }

    let mut output = format!("{}\n", title);
    output.push_str(&format!("Max: {:.4}\n", max_val));
    for row in plot.iter() {
        output.push_str(&row.iter().collect::<String>());
        output.push('\n');
    }
    output.push_str(&format!("Min: {:.4}\n", min_val));
    output.push_str(&format!("Points: {}\n", values.len()));
    output
}

/// Human-readable end-of-training summary.
pub fn training_summary(report: &TrainingReport) -> String {
    let mut output = String::new();
    output.push_str("Training Summary\n");
    output.push_str("================\n");
    output.push_str(&format!("Episodes: {}, Steps: {}, Final ε: {:.3}\n",
                             report.episodes, report.total_steps, report.final_epsilon));
    output.push_str(&format!("Mean reward: {:.3}\n", report.mean_reward));
    output.push_str(&format!("Percent of successful episodes: {:.3}%\n", report.success_percentage));
    if let Some(loss) = report.mean_loss {
        output.push_str(&format!("Mean loss: {:.5}\n", loss));
    }
    if report.skipped_updates > 0 {
        output.push_str(&format!("Skipped updates (non-finite values): {}\n", report.skipped_updates));
    }
    if !report.smoothed_rewards.is_empty() {
        output.push('\n');
        output.push_str(&plot_series(&report.smoothed_rewards, "Reward (mean per 100 episodes)", 60, 15));
    }
    output
}
